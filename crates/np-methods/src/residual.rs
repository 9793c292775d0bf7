//! Residual evaluation.
//!
//! Operator trees are compiled once against the domain and the trial
//! bindings: variables become coordinate indices, applied functions become
//! binding indices or elementary functions, and derivative depth is checked
//! against [`MAX_DERIVATIVE_ORDER`]. Structural problems therefore surface
//! before training starts.
//!
//! Evaluation works on [`Jet`]s. A derivative node of order `k` with respect
//! to axis `v` seeds `k` fresh infinitesimals on coordinate `v`, evaluates
//! its child and projects out the coefficient of their product. Nested
//! derivative nodes use disjoint infinitesimals, so mixed and higher partials
//! of arbitrary child expressions are exact.

use np_core::{Error, Real, Result};
use np_math::{Array, Jet, Scalar, MAX_DERIVATIVE_ORDER};
use np_networks::{Approximator, TrialBindings};
use np_symbolic::{Domain, ElementaryFunction, Equation, OperatorNode};

/// Largest exponent evaluated by repeated multiplication.
const MAX_INTEGER_EXPONENT: Real = 64.0;

// ── Compiled form ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Constant(Real),
    Coordinate(usize),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    IntegerPower(Box<Expr>, i32),
    RealPower(Box<Expr>, Real),
    Power(Box<Expr>, Box<Expr>),
    Elementary(ElementaryFunction, Box<Expr>),
    Trial { binding: usize, args: Vec<Expr> },
    Derivative { order: usize, axis: usize, child: Box<Expr> },
}

/// An equation compiled into `lhs − rhs`.
#[derive(Debug, Clone)]
pub struct CompiledResidual {
    label: String,
    lhs: Expr,
    rhs: Expr,
    depth: usize,
}

impl CompiledResidual {
    /// The term label (`"equation 0"`, `"boundary condition 1"`, ...).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Largest cumulative derivative order.
    pub fn derivative_depth(&self) -> usize {
        self.depth
    }
}

struct Frame<'p, S: Scalar> {
    coords: Vec<Jet<S>>,
    params: &'p [Jet<S>],
    used_bits: usize,
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Compiles and evaluates residuals of a PDE system for given trial
/// functions.
#[derive(Debug, Clone)]
pub struct ResidualEvaluator<A> {
    domain: Domain,
    bindings: TrialBindings<A>,
}

impl<A: Approximator> ResidualEvaluator<A> {
    /// An evaluator over `domain` using `bindings` for the unknowns.
    pub fn new(domain: Domain, bindings: TrialBindings<A>) -> Self {
        Self { domain, bindings }
    }

    /// The domain; coordinates of points follow its axis order.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The trial bindings.
    pub fn bindings(&self) -> &TrialBindings<A> {
        &self.bindings
    }

    /// Compile `equation` under the term name `label`.
    pub fn compile(&self, label: &str, equation: &Equation) -> Result<CompiledResidual> {
        let depth = equation.derivative_depth();
        for side in [&equation.lhs, &equation.rhs] {
            if side.derivative_depth() > MAX_DERIVATIVE_ORDER {
                return Err(Error::UnsupportedOperator(format!(
                    "{side} in {label} needs derivative order {}, at most {MAX_DERIVATIVE_ORDER} is supported",
                    side.derivative_depth()
                )));
            }
        }
        Ok(CompiledResidual {
            label: label.to_string(),
            lhs: self.compile_node(label, &equation.lhs)?,
            rhs: self.compile_node(label, &equation.rhs)?,
            depth,
        })
    }

    fn compile_node(&self, label: &str, node: &OperatorNode) -> Result<Expr> {
        let all = |nodes: &[OperatorNode]| -> Result<Vec<Expr>> {
            nodes.iter().map(|n| self.compile_node(label, n)).collect()
        };
        Ok(match node {
            OperatorNode::Constant(c) => Expr::Constant(*c),
            OperatorNode::Variable(v) => Expr::Coordinate(self.axis(label, v)?),
            OperatorNode::Sum(terms) => Expr::Sum(all(terms)?),
            OperatorNode::Product(terms) => Expr::Product(all(terms)?),
            OperatorNode::Power { base, exponent } => {
                let base = Box::new(self.compile_node(label, base)?);
                match exponent.as_constant() {
                    Some(e) if e.fract() == 0.0 && e.abs() <= MAX_INTEGER_EXPONENT => {
                        Expr::IntegerPower(base, e as i32)
                    }
                    Some(e) => Expr::RealPower(base, e),
                    None => Expr::Power(base, Box::new(self.compile_node(label, exponent)?)),
                }
            }
            OperatorNode::AppliedFunction { name, args } => {
                if let Some(binding) = self.bindings.position(name) {
                    let expected = self.bindings.input_dim(name).unwrap_or(0);
                    if args.len() != expected {
                        return Err(Error::malformed(
                            label,
                            format!(
                                "'{name}' is applied to {} arguments but its trial function takes {expected}",
                                args.len()
                            ),
                        ));
                    }
                    Expr::Trial {
                        binding,
                        args: all(args)?,
                    }
                } else if let Some(f) = ElementaryFunction::from_name(name) {
                    match args.as_slice() {
                        [arg] => Expr::Elementary(f, Box::new(self.compile_node(label, arg)?)),
                        _ => {
                            return Err(Error::malformed(
                                label,
                                format!("'{name}' takes one argument, got {}", args.len()),
                            ))
                        }
                    }
                } else {
                    return Err(Error::malformed(
                        label,
                        format!("no trial function bound to '{name}'"),
                    ));
                }
            }
            OperatorNode::PartialDerivative {
                order,
                variable,
                child,
            } => {
                if *order == 0 {
                    return Err(Error::malformed(label, "derivative of order 0"));
                }
                Expr::Derivative {
                    order: *order,
                    axis: self.axis(label, variable)?,
                    child: Box::new(self.compile_node(label, child)?),
                }
            }
        })
    }

    fn axis(&self, label: &str, variable: &str) -> Result<usize> {
        self.domain
            .index_of(variable)
            .ok_or_else(|| Error::malformed(label, format!("undeclared variable '{variable}'")))
    }

    /// Value of an arbitrary operator tree at `point`.
    pub fn evaluate(&self, node: &OperatorNode, params: &Array, point: &[Real]) -> Result<Real> {
        let equation = Equation::new(node.clone(), 0.0);
        let compiled = self.compile("expression", &equation)?;
        self.evaluate_scalar(&compiled, params.as_slice(), point)
    }

    /// The residual `lhs − rhs` at `point` for plain parameters.
    pub fn residual(&self, residual: &CompiledResidual, params: &Array, point: &[Real]) -> Result<Real> {
        self.evaluate_scalar(residual, params.as_slice(), point)
    }

    /// The residual `lhs − rhs` at `point`, generic over the scalar type of
    /// the parameters. With [`np_math::Var`] parameters the result can be
    /// differentiated with respect to them.
    pub fn evaluate_scalar<S: Scalar>(
        &self,
        residual: &CompiledResidual,
        params: &[S],
        point: &[Real],
    ) -> Result<S> {
        if point.len() != self.domain.dimension() {
            return Err(Error::InvalidArgument(format!(
                "point has {} coordinates, the domain has {} axes",
                point.len(),
                self.domain.dimension()
            )));
        }
        let params: Vec<Jet<S>> = params.iter().map(|&p| Jet::constant(p)).collect();
        let mut frame = Frame {
            coords: point
                .iter()
                .map(|&x| Jet::constant(S::from_real(x)))
                .collect(),
            params: &params,
            used_bits: 0,
        };
        let lhs = self.eval(&residual.lhs, &mut frame)?;
        let rhs = self.eval(&residual.rhs, &mut frame)?;
        Ok((lhs - rhs).primal())
    }

    fn eval<S: Scalar>(&self, expr: &Expr, frame: &mut Frame<'_, S>) -> Result<Jet<S>> {
        Ok(match expr {
            Expr::Constant(c) => Jet::constant(S::from_real(*c)),
            Expr::Coordinate(i) => frame.coords[*i],
            Expr::Sum(terms) => {
                let mut acc = Jet::constant(S::from_real(0.0));
                for t in terms {
                    acc = acc + self.eval(t, frame)?;
                }
                acc
            }
            Expr::Product(terms) => {
                let mut acc = Jet::constant(S::from_real(1.0));
                for t in terms {
                    acc = acc * self.eval(t, frame)?;
                }
                acc
            }
            Expr::IntegerPower(base, n) => self.eval(base, frame)?.powi(*n),
            Expr::RealPower(base, p) => self.eval(base, frame)?.powf(*p),
            Expr::Power(base, exponent) => {
                let b = self.eval(base, frame)?;
                let e = self.eval(exponent, frame)?;
                (e * b.ln()).exp()
            }
            Expr::Elementary(f, arg) => f.apply(self.eval(arg, frame)?),
            Expr::Trial { binding, args } => {
                let mut inputs = Vec::with_capacity(args.len());
                for a in args {
                    inputs.push(self.eval(a, frame)?);
                }
                self.bindings.evaluate(*binding, frame.params, &inputs)?
            }
            Expr::Derivative { order, axis, child } => {
                if frame.used_bits + order > MAX_DERIVATIVE_ORDER {
                    return Err(Error::UnsupportedOperator(format!(
                        "derivative of order {order} nested {} deep exceeds the supported order {MAX_DERIVATIVE_ORDER}",
                        frame.used_bits
                    )));
                }
                let mask = ((1usize << order) - 1) << frame.used_bits;
                let saved = frame.coords[*axis];
                frame.coords[*axis] = saved + Jet::seeded(S::from_real(0.0), mask);
                frame.used_bits += order;
                let value = self.eval(child, frame);
                frame.used_bits -= order;
                frame.coords[*axis] = saved;
                value?.project(mask)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use np_math::Tape;
    use np_networks::{Activation, FeedForwardNetwork};
    use np_symbolic::DomainAxis;

    /// A fixed "network" `u(x, y) = a·x³y + b·y²` with parameters `[a, b]`.
    #[derive(Debug, Clone)]
    struct Polynomial;

    impl Approximator for Polynomial {
        fn input_dim(&self) -> usize {
            2
        }
        fn output_dim(&self) -> usize {
            1
        }
        fn parameter_count(&self) -> usize {
            2
        }
        fn initial_parameters(&self, _seed: u64) -> Array {
            Array::from_slice(&[1.0, 1.0])
        }
        fn apply<S: Scalar>(&self, p: &[S], x: &[S]) -> Result<Vec<S>> {
            Ok(vec![p[0] * x[0].powi(3) * x[1] + p[1] * x[1] * x[1]])
        }
    }

    fn square() -> Domain {
        Domain::new(vec![
            DomainAxis::new("x", -1.0, 1.0).unwrap(),
            DomainAxis::new("y", -1.0, 1.0).unwrap(),
        ])
        .unwrap()
    }

    fn evaluator() -> ResidualEvaluator<Polynomial> {
        let bindings = TrialBindings::shared(Polynomial, &["u"]).unwrap();
        ResidualEvaluator::new(square(), bindings)
    }

    fn u() -> OperatorNode {
        OperatorNode::apply("u", vec!["x".into(), "y".into()])
    }

    fn d(node: OperatorNode, v: &str, k: usize) -> OperatorNode {
        OperatorNode::derivative(node, v, k).unwrap()
    }

    #[test]
    fn laplacian_of_exact_polynomial_vanishes() {
        // u = x³y + y², Δu = 6xy + 2
        let ev = evaluator();
        let lhs = d(u(), "x", 2) + d(u(), "y", 2);
        let x = OperatorNode::variable("x");
        let y = OperatorNode::variable("y");
        let rhs = 6.0 * x * y + 2.0;
        let r = ev.compile("equation 0", &Equation::new(lhs, rhs)).unwrap();
        let theta = Array::from_slice(&[1.0, 1.0]);
        for point in [[0.3, -0.7], [1.0, 1.0], [-0.5, 0.25]] {
            let value = ev.residual(&r, &theta, &point).unwrap();
            assert!(value.abs() < 1e-5, "residual {value} at {point:?}");
        }
    }

    #[test]
    fn mixed_and_higher_partials() {
        let ev = evaluator();
        let theta = Array::from_slice(&[1.0, 1.0]);
        let p = [0.5, 2.0];
        // ∂²u/∂x∂y = 3x²
        let mixed = ev.evaluate(&d(d(u(), "y", 1), "x", 1), &theta, &p).unwrap();
        assert_relative_eq!(mixed, 0.75, epsilon = 1e-12);
        // ∂³u/∂x³ = 6y, ∂⁴u/∂x³∂y = 6
        let third = ev.evaluate(&d(u(), "x", 3), &theta, &p).unwrap();
        assert_relative_eq!(third, 12.0, epsilon = 1e-12);
        let fourth = ev.evaluate(&d(d(u(), "x", 3), "y", 1), &theta, &p).unwrap();
        assert_relative_eq!(fourth, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn derivative_of_composite_expression() {
        // d/dx [x · sin(u)] = sin(u) + x cos(u) · 3x²y
        let ev = evaluator();
        let x = OperatorNode::variable("x");
        let node = d(x * u().sin(), "x", 1);
        let theta = Array::from_slice(&[1.0, 0.0]);
        let (px, py) = (0.4_f64, 1.5_f64);
        let uu = px.powi(3) * py;
        let expected = uu.sin() + px * uu.cos() * 3.0 * px * px * py;
        assert_relative_eq!(ev.evaluate(&node, &theta, &[px, py]).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn powers() {
        let ev = evaluator();
        let theta = Array::from_slice(&[1.0, 1.0]);
        let x = OperatorNode::variable("x");
        let y = OperatorNode::variable("y");
        let p = [2.0, 3.0];
        assert_relative_eq!(ev.evaluate(&x.clone().pow(3.0), &theta, &p).unwrap(), 8.0, epsilon = 1e-12);
        assert_relative_eq!(ev.evaluate(&x.clone().pow(0.5), &theta, &p).unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(ev.evaluate(&x.clone().pow(y), &theta, &p).unwrap(), 8.0, epsilon = 1e-12);
        assert_relative_eq!(ev.evaluate(&(1.0 / x), &theta, &p).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn order_beyond_backend_limit_is_unsupported() {
        let ev = evaluator();
        let deep = d(d(u(), "x", 3), "y", 2);
        let err = ev.compile("equation 0", &Equation::new(deep, 0.0)).unwrap_err();
        match err {
            Error::UnsupportedOperator(msg) => assert!(msg.contains("u(x, y)"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unbound_function_is_malformed() {
        let ev = evaluator();
        let v = OperatorNode::apply("v", vec!["x".into()]);
        let err = ev.compile("boundary condition 3", &Equation::new(v, 0.0)).unwrap_err();
        assert!(matches!(err, Error::MalformedSystem { ref term, .. } if term == "boundary condition 3"));
        let arity = OperatorNode::apply("u", vec!["x".into()]);
        assert!(ev.compile("equation 0", &Equation::new(arity, 0.0)).is_err());
    }

    #[test]
    fn parameter_gradient_of_derivative_residual() {
        // r = ∂²u/∂x² − 1 with u = a x³ y + b y²: r = 6axy − 1, ∂r/∂a = 6xy, ∂r/∂b = 0
        let ev = evaluator();
        let r = ev.compile("equation 0", &Equation::new(d(u(), "x", 2), 1.0)).unwrap();
        let tape = Tape::new();
        let theta = tape.vars(&[0.7, -0.2]);
        let value = ev.evaluate_scalar(&r, &theta, &[0.5, 2.0]).unwrap();
        assert_relative_eq!(value.value(), 6.0 * 0.7 * 0.5 * 2.0 - 1.0, epsilon = 1e-12);
        let g = tape.gradient(value).wrt_all(&theta);
        assert_relative_eq!(g[0], 6.0, epsilon = 1e-12);
        assert_relative_eq!(g[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn network_second_derivative_matches_finite_differences() {
        let net = FeedForwardNetwork::new(&[1, 8, 1], Activation::Tanh).unwrap();
        let theta = net.initial_parameters(9);
        let domain = Domain::new(vec![DomainAxis::new("x", 0.0, 1.0).unwrap()]).unwrap();
        let bindings = TrialBindings::shared(net.clone(), &["u"]).unwrap();
        let ev = ResidualEvaluator::new(domain, bindings);
        let uxx = d(OperatorNode::apply("u", vec!["x".into()]), "x", 2);
        let f = |x: Real| net.evaluate(&theta, &[x]).unwrap()[0];
        let (x, h) = (0.3, 1e-4);
        let fd = (f(x + h) - 2.0 * f(x) + f(x - h)) / (h * h);
        assert_relative_eq!(ev.evaluate(&uxx, &theta, &[x]).unwrap(), fd, epsilon = 1e-5);
    }
}
