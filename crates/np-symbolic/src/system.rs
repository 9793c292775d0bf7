//! Equations, boundary conditions and the validated PDE system.

use crate::domain::Domain;
use crate::operator::{ElementaryFunction, OperatorNode};
use np_core::{Error, Real, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for comparing fixed boundary coordinates.
const FIXED_VALUE_TOLERANCE: Real = 1e-12;

// ── Equation ──────────────────────────────────────────────────────────────────

/// `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    /// Left-hand side.
    pub lhs: OperatorNode,
    /// Right-hand side.
    pub rhs: OperatorNode,
}

impl Equation {
    /// Create `lhs = rhs`.
    pub fn new(lhs: impl Into<OperatorNode>, rhs: impl Into<OperatorNode>) -> Self {
        Self {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    /// Largest derivative depth on either side.
    pub fn derivative_depth(&self) -> usize {
        self.lhs.derivative_depth().max(self.rhs.derivative_depth())
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.lhs, self.rhs)
    }
}

// ── Boundary conditions ───────────────────────────────────────────────────────

/// Which end of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The lower bound.
    Lower,
    /// The upper bound.
    Upper,
}

/// A face of a box domain: one variable pinned to one of its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    /// The pinned variable.
    pub variable: String,
    /// The bound it is pinned to.
    pub side: Side,
}

impl Face {
    /// `variable = lower`.
    pub fn lower(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            side: Side::Lower,
        }
    }

    /// `variable = upper`.
    pub fn upper(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            side: Side::Upper,
        }
    }
}

/// An equation that only has to hold on part of the boundary.
///
/// The sub-domain is either inferred from constant arguments of dependent
/// functions (`u(0, t) = 0` holds on `x = 0`) or given as an explicit face.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition {
    /// The condition.
    pub equation: Equation,
    /// Optional explicit face.
    pub face: Option<Face>,
}

impl BoundaryCondition {
    /// A condition whose sub-domain is inferred from its constant arguments.
    pub fn new(lhs: impl Into<OperatorNode>, rhs: impl Into<OperatorNode>) -> Self {
        Self {
            equation: Equation::new(lhs, rhs),
            face: None,
        }
    }

    /// A condition imposed on an explicit face.
    pub fn on_face(lhs: impl Into<OperatorNode>, rhs: impl Into<OperatorNode>, face: Face) -> Self {
        Self {
            equation: Equation::new(lhs, rhs),
            face: Some(face),
        }
    }
}

/// A boundary condition after validation.
///
/// Constant arguments of dependent functions have been rewritten into
/// variable references, and `fixed` lists the pinned coordinates as
/// `(axis index, value)` pairs sorted by axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBoundary {
    /// The rewritten condition.
    pub equation: Equation,
    /// Pinned coordinates.
    pub fixed: Vec<(usize, Real)>,
}

// ── Dependent variables ───────────────────────────────────────────────────────

/// An unknown function and the independent variables it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentVariable {
    /// Function name.
    pub name: String,
    /// Declared arguments, by variable name.
    pub arguments: Vec<String>,
}

impl DependentVariable {
    /// Declare `name(arguments…)`.
    pub fn new<S: Into<String>>(name: impl Into<String>, arguments: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    /// `name(arguments…)` as an operator node.
    pub fn node(&self) -> OperatorNode {
        OperatorNode::apply(
            self.name.clone(),
            self.arguments
                .iter()
                .map(|a| OperatorNode::variable(a.clone()))
                .collect(),
        )
    }
}

// ── PDE system ────────────────────────────────────────────────────────────────

/// A validated PDE problem.
#[derive(Debug, Clone)]
pub struct PdeSystem {
    equations: Vec<Equation>,
    boundary_conditions: Vec<ResolvedBoundary>,
    domain: Domain,
    dependent: Vec<DependentVariable>,
}

impl PdeSystem {
    /// Validate and assemble a system.
    ///
    /// Every variable must be an axis of `domain`; every applied function
    /// must be a declared dependent variable with matching arity or a unary
    /// elementary function. Violations are reported as
    /// [`Error::MalformedSystem`] naming the term (`"equation 0"`,
    /// `"boundary condition 1"`, ...).
    pub fn new(
        equations: Vec<Equation>,
        boundary_conditions: Vec<BoundaryCondition>,
        domain: Domain,
        dependent: Vec<DependentVariable>,
    ) -> Result<Self> {
        if equations.is_empty() {
            return Err(Error::malformed("system", "no equations"));
        }
        for dv in &dependent {
            let term = format!("dependent variable {}", dv.name);
            if ElementaryFunction::from_name(&dv.name).is_some() {
                return Err(Error::malformed(term, "name shadows an elementary function"));
            }
            if dv.arguments.is_empty() {
                return Err(Error::malformed(term, "no arguments"));
            }
            for arg in &dv.arguments {
                if domain.index_of(arg).is_none() {
                    return Err(Error::malformed(
                        term,
                        format!("argument '{arg}' is not a domain variable"),
                    ));
                }
            }
            if dependent.iter().filter(|d| d.name == dv.name).count() > 1 {
                return Err(Error::malformed(term, "declared more than once"));
            }
        }

        let mut system = Self {
            equations: Vec::with_capacity(equations.len()),
            boundary_conditions: Vec::with_capacity(boundary_conditions.len()),
            domain,
            dependent,
        };

        for (i, eq) in equations.into_iter().enumerate() {
            let term = format!("equation {i}");
            system.check_node(&term, &eq.lhs)?;
            system.check_node(&term, &eq.rhs)?;
            system.equations.push(eq);
        }
        for (j, bc) in boundary_conditions.into_iter().enumerate() {
            let resolved = system.resolve_boundary(&format!("boundary condition {j}"), bc)?;
            system.boundary_conditions.push(resolved);
        }
        Ok(system)
    }

    /// The interior equations.
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// The validated boundary conditions.
    pub fn boundary_conditions(&self) -> &[ResolvedBoundary] {
        &self.boundary_conditions
    }

    /// The domain; its axes are the independent variables.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The unknown functions.
    pub fn dependent_variables(&self) -> &[DependentVariable] {
        &self.dependent
    }

    /// Look up an unknown function.
    pub fn dependent(&self, name: &str) -> Option<&DependentVariable> {
        self.dependent.iter().find(|d| d.name == name)
    }

    /// Largest derivative depth of any equation or boundary condition.
    pub fn derivative_depth(&self) -> usize {
        self.equations
            .iter()
            .chain(self.boundary_conditions.iter().map(|b| &b.equation))
            .map(Equation::derivative_depth)
            .max()
            .unwrap_or(0)
    }

    fn check_node(&self, term: &str, node: &OperatorNode) -> Result<()> {
        let mut failure = None;
        node.visit(&mut |n| {
            if failure.is_some() {
                return;
            }
            failure = self.check_single(n).err().map(|reason| Error::malformed(term, reason));
        });
        failure.map_or(Ok(()), Err)
    }

    fn check_single(&self, node: &OperatorNode) -> std::result::Result<(), String> {
        match node {
            OperatorNode::Variable(v) if self.domain.index_of(v).is_none() => {
                Err(format!("undeclared variable '{v}'"))
            }
            OperatorNode::PartialDerivative { order, variable, .. } => {
                if *order == 0 {
                    Err("derivative of order 0".to_string())
                } else if self.domain.index_of(variable).is_none() {
                    Err(format!("derivative with respect to undeclared variable '{variable}'"))
                } else {
                    Ok(())
                }
            }
            OperatorNode::Constant(c) if !c.is_finite() => Err(format!("non-finite constant {c}")),
            OperatorNode::AppliedFunction { name, args } => {
                if let Some(dv) = self.dependent(name) {
                    if dv.arguments.len() != args.len() {
                        return Err(format!(
                            "'{name}' takes {} arguments but {} were given",
                            dv.arguments.len(),
                            args.len()
                        ));
                    }
                    Ok(())
                } else if ElementaryFunction::from_name(name).is_some() {
                    if args.len() != 1 {
                        return Err(format!("'{name}' takes 1 argument but {} were given", args.len()));
                    }
                    Ok(())
                } else {
                    Err(format!("undeclared function '{name}'"))
                }
            }
            _ => Ok(()),
        }
    }

    fn resolve_boundary(&self, term: &str, bc: BoundaryCondition) -> Result<ResolvedBoundary> {
        let mut fixed: Vec<(usize, Real)> = Vec::new();
        let mut pin = |axis: usize, value: Real| -> Result<()> {
            let interval = self.domain.axes()[axis].interval;
            let variable = &self.domain.axes()[axis].variable;
            if !interval.contains(value, FIXED_VALUE_TOLERANCE * interval.span().max(1.0)) {
                return Err(Error::malformed(
                    term,
                    format!(
                        "{variable} = {value} lies outside [{}, {}]",
                        interval.lower(),
                        interval.upper()
                    ),
                ));
            }
            match fixed.iter().find(|(a, _)| *a == axis) {
                Some(&(_, existing)) if (existing - value).abs() > FIXED_VALUE_TOLERANCE => {
                    Err(Error::malformed(
                        term,
                        format!("{variable} is fixed to both {existing} and {value}"),
                    ))
                }
                Some(_) => Ok(()),
                None => {
                    fixed.push((axis, value));
                    Ok(())
                }
            }
        };

        if let Some(face) = &bc.face {
            let axis = self.domain.index_of(&face.variable).ok_or_else(|| {
                Error::malformed(
                    term,
                    format!("face variable '{}' is not a domain variable", face.variable),
                )
            })?;
            let interval = self.domain.axes()[axis].interval;
            let value = match face.side {
                Side::Lower => interval.lower(),
                Side::Upper => interval.upper(),
            };
            pin(axis, value)?;
        }

        let mut pins = Vec::new();
        let lhs = self.pin_constant_arguments(bc.equation.lhs, &mut pins);
        let rhs = self.pin_constant_arguments(bc.equation.rhs, &mut pins);
        for (axis, value) in pins {
            pin(axis, value)?;
        }

        let equation = Equation { lhs, rhs };
        self.check_node(term, &equation.lhs)?;
        self.check_node(term, &equation.rhs)?;
        if fixed.is_empty() {
            return Err(Error::malformed(
                term,
                "does not restrict the domain (no constant argument and no face)",
            ));
        }
        fixed.sort_by_key(|&(axis, _)| axis);
        Ok(ResolvedBoundary { equation, fixed })
    }

    /// Replace constant arguments of dependent functions by their declared
    /// variable, recording `(axis, value)` for each replacement.
    fn pin_constant_arguments(&self, node: OperatorNode, pins: &mut Vec<(usize, Real)>) -> OperatorNode {
        match node {
            OperatorNode::AppliedFunction { name, args } => {
                let declared = self.dependent(&name).map(|d| d.arguments.clone());
                let args = args
                    .into_iter()
                    .enumerate()
                    .map(|(k, arg)| {
                        let declared_var = declared.as_ref().and_then(|d| d.get(k));
                        match (arg.as_constant(), declared_var) {
                            (Some(value), Some(var)) => match self.domain.index_of(var) {
                                Some(axis) => {
                                    pins.push((axis, value));
                                    OperatorNode::variable(var.clone())
                                }
                                None => arg,
                            },
                            _ => self.pin_constant_arguments(arg, pins),
                        }
                    })
                    .collect();
                OperatorNode::AppliedFunction { name, args }
            }
            OperatorNode::Sum(terms) => OperatorNode::Sum(
                terms
                    .into_iter()
                    .map(|t| self.pin_constant_arguments(t, pins))
                    .collect(),
            ),
            OperatorNode::Product(terms) => OperatorNode::Product(
                terms
                    .into_iter()
                    .map(|t| self.pin_constant_arguments(t, pins))
                    .collect(),
            ),
            OperatorNode::Power { base, exponent } => OperatorNode::Power {
                base: Box::new(self.pin_constant_arguments(*base, pins)),
                exponent: Box::new(self.pin_constant_arguments(*exponent, pins)),
            },
            OperatorNode::PartialDerivative {
                order,
                variable,
                child,
            } => OperatorNode::PartialDerivative {
                order,
                variable,
                child: Box::new(self.pin_constant_arguments(*child, pins)),
            },
            leaf => leaf,
        }
    }
}
