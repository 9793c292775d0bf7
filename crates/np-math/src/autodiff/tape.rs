//! Reverse-mode differentiation on a Wengert tape.
//!
//! Each operation on an active [`Var`] appends one node recording the local
//! partial derivatives with respect to its (at most two) arguments. A single
//! reverse sweep from an output then accumulates adjoints for every input.
//!
//! Constants never touch the tape: a `Var` created by
//! [`Scalar::from_real`] carries no tape reference, and operations between a
//! constant and an active variable record a unary node.

use super::Scalar;
use np_core::Real;
use num_traits::{One, Zero};
use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy)]
enum Op {
    Input,
    Unary {
        arg: usize,
        darg: Real,
    },
    Binary {
        lhs: usize,
        rhs: usize,
        dlhs: Real,
        drhs: Real,
    },
}

/// Reverse-mode tape.
///
/// A tape is single-threaded; parallel evaluations give every worker its own
/// tape and reduce the resulting gradients afterwards.
#[derive(Debug, Default)]
pub struct Tape {
    nodes: RefCell<Vec<Op>>,
}

impl Tape {
    /// Creates an empty tape.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tape with reserved node capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    /// Number of nodes currently held on the tape.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Returns true when no nodes are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates an active input variable.
    pub fn var(&self, value: Real) -> Var<'_> {
        let index = self.push(Op::Input);
        Var {
            tape: Some(self),
            index,
            value,
        }
    }

    /// Creates one active input per value.
    pub fn vars(&self, values: &[Real]) -> Vec<Var<'_>> {
        values.iter().map(|&v| self.var(v)).collect()
    }

    fn push(&self, op: Op) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(op);
        nodes.len() - 1
    }

    /// Reverse accumulation of the adjoints of `output`.
    ///
    /// A constant output has an identically zero gradient.
    pub fn gradient(&self, output: Var<'_>) -> Gradients {
        let nodes = self.nodes.borrow();
        let mut adjoints = vec![0.0; nodes.len()];
        if let Some(tape) = output.tape {
            debug_assert!(std::ptr::eq(tape, self), "output recorded on another tape");
            adjoints[output.index] = 1.0;
        }
        for idx in (0..nodes.len()).rev() {
            let adjoint = adjoints[idx];
            if adjoint == 0.0 {
                continue;
            }
            match nodes[idx] {
                Op::Input => {}
                Op::Unary { arg, darg } => {
                    adjoints[arg] += adjoint * darg;
                }
                Op::Binary {
                    lhs,
                    rhs,
                    dlhs,
                    drhs,
                } => {
                    adjoints[lhs] += adjoint * dlhs;
                    adjoints[rhs] += adjoint * drhs;
                }
            }
        }
        Gradients { adjoints }
    }
}

/// Adjoints produced by [`Tape::gradient`].
#[derive(Debug, Clone)]
pub struct Gradients {
    adjoints: Vec<Real>,
}

impl Gradients {
    /// Derivative of the output with respect to `var` (zero for constants).
    pub fn wrt(&self, var: &Var<'_>) -> Real {
        match var.tape {
            Some(_) => self.adjoints.get(var.index).copied().unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Derivatives with respect to each of `vars`.
    pub fn wrt_all(&self, vars: &[Var<'_>]) -> Vec<Real> {
        vars.iter().map(|v| self.wrt(v)).collect()
    }
}

/// A real number tracked by a [`Tape`].
#[derive(Debug, Clone, Copy)]
pub struct Var<'t> {
    tape: Option<&'t Tape>,
    index: usize,
    value: Real,
}

impl<'t> Var<'t> {
    /// A constant that is never recorded.
    pub fn constant(value: Real) -> Self {
        Self {
            tape: None,
            index: 0,
            value,
        }
    }

    /// `true` if this variable is recorded on a tape.
    pub fn is_active(&self) -> bool {
        self.tape.is_some()
    }

    fn is_constant_zero(&self) -> bool {
        self.tape.is_none() && self.value == 0.0
    }

    fn unary(self, value: Real, darg: Real) -> Self {
        match self.tape {
            Some(tape) => Self {
                tape: Some(tape),
                index: tape.push(Op::Unary {
                    arg: self.index,
                    darg,
                }),
                value,
            },
            None => Self::constant(value),
        }
    }

    fn binary(self, rhs: Self, value: Real, dlhs: Real, drhs: Real) -> Self {
        match (self.tape, rhs.tape) {
            (Some(tape), Some(other)) => {
                debug_assert!(std::ptr::eq(tape, other), "mixing variables of two tapes");
                Self {
                    tape: Some(tape),
                    index: tape.push(Op::Binary {
                        lhs: self.index,
                        rhs: rhs.index,
                        dlhs,
                        drhs,
                    }),
                    value,
                }
            }
            (Some(_), None) => self.unary(value, dlhs),
            (None, Some(_)) => rhs.unary(value, drhs),
            (None, None) => Self::constant(value),
        }
    }
}

impl<'t> Add for Var<'t> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        if rhs.is_constant_zero() {
            return self;
        }
        if self.is_constant_zero() {
            return rhs;
        }
        self.binary(rhs, self.value + rhs.value, 1.0, 1.0)
    }
}

impl<'t> Sub for Var<'t> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        if rhs.is_constant_zero() {
            return self;
        }
        self.binary(rhs, self.value - rhs.value, 1.0, -1.0)
    }
}

impl<'t> Mul for Var<'t> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        // 0 × NaN and 0 × ∞ must stay non-finite.
        if (self.is_constant_zero() && rhs.value.is_finite())
            || (rhs.is_constant_zero() && self.value.is_finite())
        {
            return Self::constant(0.0);
        }
        self.binary(rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<'t> Div for Var<'t> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        self.binary(
            rhs,
            self.value * inv,
            inv,
            -self.value * inv * inv,
        )
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Self;
    fn neg(self) -> Self {
        self.unary(-self.value, -1.0)
    }
}

impl<'t> Add<Real> for Var<'t> {
    type Output = Self;
    fn add(self, rhs: Real) -> Self {
        if rhs == 0.0 {
            return self;
        }
        self.unary(self.value + rhs, 1.0)
    }
}

impl<'t> Sub<Real> for Var<'t> {
    type Output = Self;
    fn sub(self, rhs: Real) -> Self {
        if rhs == 0.0 {
            return self;
        }
        self.unary(self.value - rhs, 1.0)
    }
}

impl<'t> Mul<Real> for Var<'t> {
    type Output = Self;
    fn mul(self, rhs: Real) -> Self {
        if rhs == 0.0 && self.value.is_finite() {
            return Self::constant(0.0);
        }
        self.unary(self.value * rhs, rhs)
    }
}

impl<'t> Div<Real> for Var<'t> {
    type Output = Self;
    fn div(self, rhs: Real) -> Self {
        self.unary(self.value / rhs, 1.0 / rhs)
    }
}

impl<'t> Zero for Var<'t> {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl<'t> One for Var<'t> {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<'t> Scalar for Var<'t> {
    fn from_real(value: Real) -> Self {
        Self::constant(value)
    }

    fn value(&self) -> Real {
        self.value
    }

    fn sin(self) -> Self {
        self.unary(self.value.sin(), self.value.cos())
    }

    fn cos(self) -> Self {
        self.unary(self.value.cos(), -self.value.sin())
    }

    fn exp(self) -> Self {
        let v = self.value.exp();
        self.unary(v, v)
    }

    fn ln(self) -> Self {
        self.unary(self.value.ln(), 1.0 / self.value)
    }

    fn tanh(self) -> Self {
        let t = self.value.tanh();
        self.unary(t, 1.0 - t * t)
    }

    fn powf(self, p: Real) -> Self {
        self.unary(self.value.powf(p), p * self.value.powf(p - 1.0))
    }

    fn sqrt(self) -> Self {
        let v = self.value.sqrt();
        self.unary(v, 0.5 / v)
    }
}
