use np_core::Real;
use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A differentiable real number.
///
/// Implemented by `f64`, [`Var`](super::Var) and [`Jet`](super::Jet).
/// Approximators and cost functions written against this trait can be
/// evaluated plainly or differentiated in either mode without changes.
pub trait Scalar:
    Copy
    + Debug
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<Real, Output = Self>
    + Sub<Real, Output = Self>
    + Mul<Real, Output = Self>
    + Div<Real, Output = Self>
{
    /// Lift a constant.
    fn from_real(value: Real) -> Self;

    /// The primal value.
    fn value(&self) -> Real;

    /// Sine.
    fn sin(self) -> Self;

    /// Cosine.
    fn cos(self) -> Self;

    /// Exponential.
    fn exp(self) -> Self;

    /// Natural logarithm.
    fn ln(self) -> Self;

    /// Hyperbolic tangent.
    fn tanh(self) -> Self;

    /// Real power `self^p`.
    fn powf(self, p: Real) -> Self;

    /// Square root.
    fn sqrt(self) -> Self {
        self.powf(0.5)
    }

    /// Integer power by repeated multiplication.
    fn powi(self, n: i32) -> Self {
        let mut acc = Self::one();
        let mut base = self;
        let mut k = n.unsigned_abs();
        while k > 0 {
            if k & 1 == 1 {
                acc = acc * base;
            }
            base = base * base;
            k >>= 1;
        }
        if n < 0 {
            Self::one() / acc
        } else {
            acc
        }
    }

    /// Logistic sigmoid `1 / (1 + e^{-x})`.
    fn sigmoid(self) -> Self {
        ((self * 0.5).tanh() + 1.0) * 0.5
    }

    /// `true` when the primal value is finite.
    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_real(value: Real) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> Real {
        *self
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    #[inline]
    fn powf(self, p: Real) -> Self {
        f64::powf(self, p)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn generic_poly<S: Scalar>(x: S) -> S {
        x.powi(3) - x * 2.0 + 1.0
    }

    #[test]
    fn f64_is_plain_evaluation() {
        assert_abs_diff_eq!(generic_poly(2.0_f64), 5.0, epsilon = 1e-15);
        assert_abs_diff_eq!(Scalar::sigmoid(0.0_f64), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(Scalar::powi(2.0_f64, -2), 0.25, epsilon = 1e-15);
    }
}
