//! The operator expression tree.
//!
//! An [`OperatorNode`] is an immutable description of a differential
//! expression such as `∂²u/∂x² + sin(πx)`. Trees are built with the
//! constructors below and the usual arithmetic operators:
//!
//! ```
//! use np_symbolic::OperatorNode as Op;
//!
//! let x = Op::variable("x");
//! let u = Op::apply("u", vec![x.clone()]);
//! let lhs = Op::derivative(u, "x", 2).unwrap();
//! let rhs = -(std::f64::consts::PI.powi(2)) * (std::f64::consts::PI * x).sin();
//! assert_eq!(lhs.derivative_depth(), 2);
//! assert_eq!(rhs.derivative_depth(), 0);
//! ```

use np_core::{Error, Real, Result};
use np_math::Scalar;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

// ── Elementary functions ──────────────────────────────────────────────────────

/// Functions applied by name that are not unknowns of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementaryFunction {
    /// `sin`
    Sin,
    /// `cos`
    Cos,
    /// `exp`
    Exp,
    /// Natural logarithm, `log`.
    Log,
    /// `tanh`
    Tanh,
    /// `sqrt`
    Sqrt,
}

impl ElementaryFunction {
    /// Every elementary function.
    pub const ALL: [ElementaryFunction; 6] = [
        Self::Sin,
        Self::Cos,
        Self::Exp,
        Self::Log,
        Self::Tanh,
        Self::Sqrt,
    ];

    /// Look a function up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// The name used in [`OperatorNode::AppliedFunction`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
        }
    }

    /// Evaluate on any differentiable scalar.
    pub fn apply<S: Scalar>(self, x: S) -> S {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Tanh => x.tanh(),
            Self::Sqrt => x.sqrt(),
        }
    }
}

// ── Operator node ─────────────────────────────────────────────────────────────

/// A node of a differential expression.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorNode {
    /// A real constant.
    Constant(Real),
    /// An independent variable, by name.
    Variable(String),
    /// `Σ children`.
    Sum(Vec<OperatorNode>),
    /// `Π children`.
    Product(Vec<OperatorNode>),
    /// `base ^ exponent`.
    Power {
        /// Base.
        base: Box<OperatorNode>,
        /// Exponent.
        exponent: Box<OperatorNode>,
    },
    /// A dependent function (`u(x, t)`) or an elementary function (`sin(x)`).
    AppliedFunction {
        /// Function name.
        name: String,
        /// Argument expressions.
        args: Vec<OperatorNode>,
    },
    /// `∂ᵏ child / ∂ variableᵏ`.
    PartialDerivative {
        /// Derivative order, at least 1.
        order: usize,
        /// Variable of differentiation.
        variable: String,
        /// Differentiated expression.
        child: Box<OperatorNode>,
    },
}

impl OperatorNode {
    /// A constant node.
    pub fn constant(value: Real) -> Self {
        Self::Constant(value)
    }

    /// A variable reference.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Apply the function `name` to `args`.
    pub fn apply(name: impl Into<String>, args: Vec<OperatorNode>) -> Self {
        Self::AppliedFunction {
            name: name.into(),
            args,
        }
    }

    /// `∂ᵒʳᵈᵉʳ child / ∂ variableᵒʳᵈᵉʳ`. Fails for `order == 0`.
    pub fn derivative(child: OperatorNode, variable: impl Into<String>, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(Error::InvalidArgument(
                "derivative order must be at least 1".into(),
            ));
        }
        Ok(Self::PartialDerivative {
            order,
            variable: variable.into(),
            child: Box::new(child),
        })
    }

    /// First derivative of `self` with respect to `variable`.
    pub fn d(self, variable: impl Into<String>) -> Self {
        Self::PartialDerivative {
            order: 1,
            variable: variable.into(),
            child: Box::new(self),
        }
    }

    /// `self ^ exponent`.
    pub fn pow(self, exponent: impl Into<OperatorNode>) -> Self {
        Self::Power {
            base: Box::new(self),
            exponent: Box::new(exponent.into()),
        }
    }

    fn elementary(self, f: ElementaryFunction) -> Self {
        Self::apply(f.name(), vec![self])
    }

    /// `sin(self)`
    pub fn sin(self) -> Self {
        self.elementary(ElementaryFunction::Sin)
    }

    /// `cos(self)`
    pub fn cos(self) -> Self {
        self.elementary(ElementaryFunction::Cos)
    }

    /// `exp(self)`
    pub fn exp(self) -> Self {
        self.elementary(ElementaryFunction::Exp)
    }

    /// `log(self)`
    pub fn log(self) -> Self {
        self.elementary(ElementaryFunction::Log)
    }

    /// `tanh(self)`
    pub fn tanh(self) -> Self {
        self.elementary(ElementaryFunction::Tanh)
    }

    /// `sqrt(self)`
    pub fn sqrt(self) -> Self {
        self.elementary(ElementaryFunction::Sqrt)
    }

    /// Direct children of this node.
    pub fn children(&self) -> Vec<&OperatorNode> {
        match self {
            Self::Constant(_) | Self::Variable(_) => Vec::new(),
            Self::Sum(terms) | Self::Product(terms) => terms.iter().collect(),
            Self::Power { base, exponent } => vec![base.as_ref(), exponent.as_ref()],
            Self::AppliedFunction { args, .. } => args.iter().collect(),
            Self::PartialDerivative { child, .. } => vec![child.as_ref()],
        }
    }

    /// Visit every node depth-first, parents before children.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a OperatorNode)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Largest cumulative derivative order along any root-to-leaf path.
    pub fn derivative_depth(&self) -> usize {
        let below = self
            .children()
            .into_iter()
            .map(OperatorNode::derivative_depth)
            .max()
            .unwrap_or(0);
        match self {
            Self::PartialDerivative { order, .. } => order + below,
            _ => below,
        }
    }

    /// Names of all variables referenced, including differentiation variables.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| match node {
            Self::Variable(v) => {
                out.insert(v.as_str());
            }
            Self::PartialDerivative { variable, .. } => {
                out.insert(variable.as_str());
            }
            _ => {}
        });
        out
    }

    /// Names of all applied functions (dependent and elementary).
    pub fn functions(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let Self::AppliedFunction { name, .. } = node {
                out.insert(name.as_str());
            }
        });
        out
    }

    /// The value of a constant node.
    pub fn as_constant(&self) -> Option<Real> {
        match self {
            Self::Constant(c) => Some(*c),
            _ => None,
        }
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

impl From<Real> for OperatorNode {
    fn from(value: Real) -> Self {
        Self::Constant(value)
    }
}

impl From<&str> for OperatorNode {
    fn from(name: &str) -> Self {
        Self::Variable(name.to_string())
    }
}

fn flatten(lhs: OperatorNode, rhs: OperatorNode, product: bool) -> OperatorNode {
    let mut terms = Vec::new();
    for node in [lhs, rhs] {
        match (node, product) {
            (OperatorNode::Sum(inner), false) | (OperatorNode::Product(inner), true) => {
                terms.extend(inner)
            }
            (other, _) => terms.push(other),
        }
    }
    if product {
        OperatorNode::Product(terms)
    } else {
        OperatorNode::Sum(terms)
    }
}

impl Add for OperatorNode {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        flatten(self, rhs, false)
    }
}

impl Sub for OperatorNode {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        flatten(self, -rhs, false)
    }
}

impl Mul for OperatorNode {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        flatten(self, rhs, true)
    }
}

impl Div for OperatorNode {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        flatten(self, rhs.pow(-1.0), true)
    }
}

impl Neg for OperatorNode {
    type Output = Self;
    fn neg(self) -> Self {
        match self {
            Self::Constant(c) => Self::Constant(-c),
            other => flatten(Self::Constant(-1.0), other, true),
        }
    }
}

macro_rules! mixed_real_ops {
    ($($trait:ident :: $method:ident),*) => {$(
        impl $trait<Real> for OperatorNode {
            type Output = OperatorNode;
            fn $method(self, rhs: Real) -> OperatorNode {
                $trait::$method(self, OperatorNode::Constant(rhs))
            }
        }

        impl $trait<OperatorNode> for Real {
            type Output = OperatorNode;
            fn $method(self, rhs: OperatorNode) -> OperatorNode {
                $trait::$method(OperatorNode::Constant(self), rhs)
            }
        }
    )*};
}

mixed_real_ops!(Add::add, Sub::sub, Mul::mul, Div::div);

// ── Display ───────────────────────────────────────────────────────────────────

fn join(f: &mut fmt::Formatter<'_>, nodes: &[OperatorNode], sep: &str) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

impl fmt::Display for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(c) => write!(f, "{c}"),
            Self::Variable(v) => f.write_str(v),
            Self::Sum(terms) => {
                f.write_str("(")?;
                join(f, terms, " + ")?;
                f.write_str(")")
            }
            Self::Product(terms) => join(f, terms, " * "),
            Self::Power { base, exponent } => write!(f, "({base})^({exponent})"),
            Self::AppliedFunction { name, args } => {
                write!(f, "{name}(")?;
                join(f, args, ", ")?;
                f.write_str(")")
            }
            Self::PartialDerivative {
                order: 1,
                variable,
                child,
            } => write!(f, "d/d{variable}[{child}]"),
            Self::PartialDerivative {
                order,
                variable,
                child,
            } => write!(f, "d^{order}/d{variable}^{order}[{child}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(arg: OperatorNode) -> OperatorNode {
        OperatorNode::apply("u", vec![arg])
    }

    #[test]
    fn operators_flatten() {
        let x = OperatorNode::variable("x");
        let e = x.clone() + 1.0 + x.clone() * 2.0 * x.clone();
        match &e {
            OperatorNode::Sum(terms) => {
                assert_eq!(terms.len(), 3);
                assert!(matches!(&terms[2], OperatorNode::Product(p) if p.len() == 3));
            }
            other => panic!("expected a sum, got {other}"),
        }
    }

    #[test]
    fn negation_folds_constants() {
        assert_eq!(-OperatorNode::constant(2.0), OperatorNode::Constant(-2.0));
        let x = OperatorNode::variable("x");
        assert_eq!(
            -x.clone(),
            OperatorNode::Product(vec![OperatorNode::Constant(-1.0), x])
        );
    }

    #[test]
    fn derivative_depth_accumulates_along_paths() {
        let x = OperatorNode::variable("x");
        let inner = OperatorNode::derivative(u(x.clone()), "x", 2).unwrap();
        let outer = OperatorNode::derivative(inner.clone() * u(x), "t", 1).unwrap();
        assert_eq!(inner.derivative_depth(), 2);
        assert_eq!(outer.derivative_depth(), 3);
        assert_eq!((outer + inner).derivative_depth(), 3);
    }

    #[test]
    fn zero_order_rejected() {
        assert!(OperatorNode::derivative(OperatorNode::constant(1.0), "x", 0).is_err());
    }

    #[test]
    fn collects_names() {
        let x = OperatorNode::variable("x");
        let e = u(x.clone()).d("t") + x.sin();
        assert_eq!(e.variables().into_iter().collect::<Vec<_>>(), ["t", "x"]);
        assert_eq!(e.functions().into_iter().collect::<Vec<_>>(), ["sin", "u"]);
    }

    #[test]
    fn display_is_readable() {
        let x = OperatorNode::variable("x");
        let e = OperatorNode::derivative(u(x.clone()), "x", 2).unwrap() - x.sin();
        assert_eq!(e.to_string(), "(d^2/dx^2[u(x)] + -1 * sin(x))");
    }

    #[test]
    fn elementary_lookup() {
        for f in ElementaryFunction::ALL {
            assert_eq!(ElementaryFunction::from_name(f.name()), Some(f));
        }
        assert_eq!(ElementaryFunction::from_name("u"), None);
        assert!((ElementaryFunction::Sqrt.apply(4.0_f64) - 2.0).abs() < 1e-15);
    }
}
