//! Forward mode over nilpotent infinitesimals.
//!
//! A [`Jet`] is a truncated multivariate Taylor expansion in up to
//! [`MAX_DERIVATIVE_ORDER`] infinitesimals `ε₀ … ε₃` with `εᵢ² = 0`. Its
//! coefficients are indexed by bitmask: coefficient `m` multiplies the
//! product of the infinitesimals whose bits are set in `m`.
//!
//! Seeding the input `x` with `x + ε₀ + ε₁` makes the coefficient of `ε₀ε₁`
//! in `f(x)` equal to `∂²f/∂x²`; seeding `x + ε₀` and `y + ε₁` yields the
//! mixed partial `∂²f/∂x∂y` in the same coefficient. Higher and mixed orders
//! follow the same pattern, one infinitesimal per differentiation.

use super::Scalar;
use np_core::Real;
use num_traits::{One, Zero};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Largest total derivative order a single evaluation can request.
pub const MAX_DERIVATIVE_ORDER: usize = 4;

const CAPACITY: usize = 1 << MAX_DERIVATIVE_ORDER;

/// Truncated Taylor expansion with scalar coefficients of type `S`.
#[derive(Debug, Clone, Copy)]
pub struct Jet<S: Scalar> {
    coeffs: [S; CAPACITY],
    order: usize,
}

impl<S: Scalar> Jet<S> {
    /// A jet with no infinitesimal part.
    pub fn constant(value: S) -> Self {
        let mut coeffs = [S::zero(); CAPACITY];
        coeffs[0] = value;
        Self { coeffs, order: 0 }
    }

    /// `value + Σ εᵢ` for every bit `i` set in `mask`.
    ///
    /// `mask` must only use the lowest [`MAX_DERIVATIVE_ORDER`] bits.
    pub fn seeded(value: S, mask: usize) -> Self {
        debug_assert!(mask < CAPACITY, "seed mask {mask:#b} exceeds jet capacity");
        let mut jet = Self::constant(value);
        for bit in 0..MAX_DERIVATIVE_ORDER {
            if mask & (1 << bit) != 0 {
                jet.coeffs[1 << bit] = S::one();
                jet.order = jet.order.max(bit + 1);
            }
        }
        jet
    }

    /// Number of infinitesimals this jet carries.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The constant (primal) coefficient.
    pub fn primal(&self) -> S {
        self.coeffs[0]
    }

    /// Coefficient of the infinitesimal product selected by `mask`.
    pub fn coefficient(&self, mask: usize) -> S {
        self.coeffs.get(mask).copied().unwrap_or_else(S::zero)
    }

    /// Extract the part proportional to every infinitesimal in `mask`,
    /// expressed in the remaining infinitesimals.
    ///
    /// After projection the bits of `mask` are free to be reused.
    pub fn project(&self, mask: usize) -> Self {
        let mut out = [S::zero(); CAPACITY];
        for (m, slot) in out.iter_mut().enumerate().take(self.len()) {
            if m & mask == 0 {
                *slot = self.coeffs[m | mask];
            }
        }
        Self {
            coeffs: out,
            order: self.order,
        }
    }

    /// Multiply every coefficient by a scalar of the coefficient type.
    pub fn scale(self, factor: S) -> Self {
        let mut out = self;
        for c in out.coeffs.iter_mut().take(self.len()) {
            *c = *c * factor;
        }
        out
    }

    fn len(&self) -> usize {
        1 << self.order
    }

    fn zip(self, rhs: Self, f: impl Fn(S, S) -> S) -> Self {
        let order = self.order.max(rhs.order);
        let mut coeffs = [S::zero(); CAPACITY];
        for (m, slot) in coeffs.iter_mut().enumerate().take(1 << order) {
            *slot = f(self.coeffs[m], rhs.coeffs[m]);
        }
        Self { coeffs, order }
    }

    /// `f(self)` from the derivatives `f⁽ᵏ⁾(primal)`, `k = 0..=order`.
    fn compose(self, derivatives: &[S]) -> Self {
        let mut nilpotent = self;
        nilpotent.coeffs[0] = S::zero();
        let mut out = Self::constant(derivatives[0]);
        let mut power = nilpotent;
        let mut factorial = 1.0;
        for (k, &d) in derivatives.iter().enumerate().take(self.order + 1).skip(1) {
            factorial *= k as Real;
            out = out + power.scale(d / factorial);
            power = power * nilpotent;
        }
        out
    }

    fn derivatives(&self, f: impl Fn(usize) -> S) -> [S; MAX_DERIVATIVE_ORDER + 1] {
        let mut out = [S::zero(); MAX_DERIVATIVE_ORDER + 1];
        for (k, slot) in out.iter_mut().enumerate().take(self.order + 1) {
            *slot = f(k);
        }
        out
    }

    fn recip(self) -> Self {
        let a = self.primal();
        let inv = S::one() / a;
        let d = self.derivatives(|k| {
            // (-1)^k k! / a^(k+1)
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            let fact: Real = (1..=k).map(|i| i as Real).product();
            inv.powi(k as i32 + 1) * (sign * fact)
        });
        self.compose(&d)
    }
}

impl<S: Scalar> Add for Jet<S> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a + b)
    }
}

impl<S: Scalar> Sub for Jet<S> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.zip(rhs, |a, b| a - b)
    }
}

impl<S: Scalar> Mul for Jet<S> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let order = self.order.max(rhs.order);
        let mut coeffs = [S::zero(); CAPACITY];
        for (m, slot) in coeffs.iter_mut().enumerate().take(1 << order) {
            // Sum over the ways of splitting the infinitesimals of `m`.
            let mut acc = S::zero();
            let mut s = m;
            loop {
                acc = acc + self.coeffs[s] * rhs.coeffs[m ^ s];
                if s == 0 {
                    break;
                }
                s = (s - 1) & m;
            }
            *slot = acc;
        }
        Self { coeffs, order }
    }
}

impl<S: Scalar> Div for Jet<S> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        if rhs.order == 0 {
            return self.scale(S::one() / rhs.primal());
        }
        self * rhs.recip()
    }
}

impl<S: Scalar> Neg for Jet<S> {
    type Output = Self;
    fn neg(self) -> Self {
        self * -1.0
    }
}

impl<S: Scalar> Add<Real> for Jet<S> {
    type Output = Self;
    fn add(mut self, rhs: Real) -> Self {
        self.coeffs[0] = self.coeffs[0] + rhs;
        self
    }
}

impl<S: Scalar> Sub<Real> for Jet<S> {
    type Output = Self;
    fn sub(mut self, rhs: Real) -> Self {
        self.coeffs[0] = self.coeffs[0] - rhs;
        self
    }
}

impl<S: Scalar> Mul<Real> for Jet<S> {
    type Output = Self;
    fn mul(mut self, rhs: Real) -> Self {
        for c in self.coeffs.iter_mut().take(1 << self.order) {
            *c = *c * rhs;
        }
        self
    }
}

impl<S: Scalar> Div<Real> for Jet<S> {
    type Output = Self;
    fn div(self, rhs: Real) -> Self {
        self * (1.0 / rhs)
    }
}

impl<S: Scalar> Zero for Jet<S> {
    fn zero() -> Self {
        Self::constant(S::zero())
    }

    fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| c.value() == 0.0)
    }
}

impl<S: Scalar> One for Jet<S> {
    fn one() -> Self {
        Self::constant(S::one())
    }
}

impl<S: Scalar> Scalar for Jet<S> {
    fn from_real(value: Real) -> Self {
        Self::constant(S::from_real(value))
    }

    fn value(&self) -> Real {
        self.coeffs[0].value()
    }

    fn sin(self) -> Self {
        let (s, c) = (self.primal().sin(), self.primal().cos());
        let d = self.derivatives(|k| match k % 4 {
            0 => s,
            1 => c,
            2 => -s,
            _ => -c,
        });
        self.compose(&d)
    }

    fn cos(self) -> Self {
        let (s, c) = (self.primal().sin(), self.primal().cos());
        let d = self.derivatives(|k| match k % 4 {
            0 => c,
            1 => -s,
            2 => -c,
            _ => s,
        });
        self.compose(&d)
    }

    fn exp(self) -> Self {
        let e = self.primal().exp();
        let d = self.derivatives(|_| e);
        self.compose(&d)
    }

    fn ln(self) -> Self {
        let a = self.primal();
        let inv = S::one() / a;
        let d = self.derivatives(|k| {
            if k == 0 {
                return a.ln();
            }
            // (-1)^(k-1) (k-1)! / a^k
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            let fact: Real = (1..k).map(|i| i as Real).product();
            inv.powi(k as i32) * (sign * fact)
        });
        self.compose(&d)
    }

    fn tanh(self) -> Self {
        let t = self.primal().tanh();
        let t2 = t * t;
        let d = self.derivatives(|k| match k {
            0 => t,
            1 => -t2 + 1.0,
            2 => (t2 * t - t) * 2.0,
            3 => t2 * 8.0 - t2 * t2 * 6.0 - 2.0,
            _ => t * 16.0 - t2 * t * 40.0 + t2 * t2 * t * 24.0,
        });
        self.compose(&d)
    }

    fn powf(self, p: Real) -> Self {
        let a = self.primal();
        let d = self.derivatives(|k| {
            let falling: Real = (0..k).map(|i| p - i as Real).product();
            a.powf(p - k as Real) * falling
        });
        self.compose(&d)
    }

    fn is_finite(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Tape;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn second_derivative_of_product() {
        // f(x) = x sin x, f'' = 2 cos x − x sin x
        let x = Jet::seeded(0.7_f64, 0b11);
        let f = x * x.sin();
        let expected = 2.0 * 0.7_f64.cos() - 0.7 * 0.7_f64.sin();
        assert_relative_eq!(f.coefficient(0b11), expected, epsilon = 1e-12);
        assert_relative_eq!(f.coefficient(0b01), 0.7_f64.sin() + 0.7 * 0.7_f64.cos(), epsilon = 1e-12);
    }

    #[test]
    fn mixed_partial() {
        // f(x, y) = x² y³, ∂²f/∂x∂y = 6 x y²
        let x = Jet::seeded(1.5_f64, 0b01);
        let y = Jet::seeded(-0.5_f64, 0b10);
        let f = x.powi(2) * y.powi(3);
        assert_relative_eq!(f.coefficient(0b11), 6.0 * 1.5 * 0.25, epsilon = 1e-12);
    }

    #[test]
    fn fourth_derivatives_of_elementary_functions() {
        let a = 0.4_f64;
        let x = Jet::seeded(a, 0b1111);
        let t = a.tanh();
        let cases = [
            (x.sin(), a.sin()),
            (x.cos(), a.cos()),
            (x.exp(), a.exp()),
            (x.ln(), -6.0 / a.powi(4)),
            (x.tanh(), 16.0 * t - 40.0 * t.powi(3) + 24.0 * t.powi(5)),
            (x.powf(2.5), 2.5 * 1.5 * 0.5 * -0.5 * a.powf(-1.5)),
            (x.recip(), 24.0 / a.powi(5)),
        ];
        for (i, (f, expected)) in cases.iter().enumerate() {
            assert_relative_eq!(
                f.coefficient(0b1111),
                *expected,
                epsilon = 1e-9,
                max_relative = 1e-9
            );
            assert!(f.is_finite(), "case {i}");
        }
    }

    #[test]
    fn projection_frees_bits() {
        // d/dx of (x² seeded once) then again via projection of a fresh bit
        let x = Jet::seeded(2.0_f64, 0b01);
        let f = x * x * x;
        let df = f.project(0b01); // 3x² as a constant jet
        assert_relative_eq!(df.primal(), 12.0, epsilon = 1e-12);
        assert_relative_eq!(df.coefficient(0b01), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn nested_in_reverse_mode() {
        // g(w) = ∂²/∂x² [tanh(w x)] at x = 0.5, dg/dw by reverse mode.
        let tape = Tape::new();
        let w = tape.var(1.3);
        let x = Jet::seeded(crate::autodiff::Var::from_real(0.5), 0b11);
        let f = (x * Jet::constant(w)).tanh();
        let g = f.coefficient(0b11);

        let second = |w: Real| {
            let t = (w * 0.5).tanh();
            w * w * (-2.0 * t * (1.0 - t * t))
        };
        assert_relative_eq!(g.value(), second(1.3), epsilon = 1e-12);

        let h = 1e-6;
        let fd = (second(1.3 + h) - second(1.3 - h)) / (2.0 * h);
        assert_relative_eq!(tape.gradient(g).wrt(&w), fd, epsilon = 1e-6);
    }

    #[test]
    fn division_matches_quotient_rule() {
        let x = Jet::seeded(1.2_f64, 0b1);
        let f = x.sin() / (x * x + 1.0);
        let u = 1.2_f64;
        let expected = (u.cos() * (u * u + 1.0) - u.sin() * 2.0 * u) / (u * u + 1.0).powi(2);
        assert_relative_eq!(f.coefficient(0b1), expected, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn cubic_derivatives_are_exact(c in prop::array::uniform4(-3.0..3.0_f64), x in -2.0..2.0_f64) {
            let j = Jet::seeded(x, 0b111);
            let p = ((j * c[3] + c[2]) * j + c[1]) * j + c[0];
            let d1 = c[1] + 2.0 * c[2] * x + 3.0 * c[3] * x * x;
            let d2 = 2.0 * c[2] + 6.0 * c[3] * x;
            let d3 = 6.0 * c[3];
            prop_assert!((p.coefficient(0b001) - d1).abs() < 1e-10 * (1.0 + d1.abs()));
            prop_assert!((p.coefficient(0b011) - d2).abs() < 1e-10 * (1.0 + d2.abs()));
            prop_assert!((p.coefficient(0b111) - d3).abs() < 1e-10 * (1.0 + d3.abs()));
        }

        #[test]
        fn composition_matches_finite_differences(a in -1.5..1.5_f64, b in -1.0..1.0_f64, x in -1.0..1.0_f64) {
            let f = |x: Real| (a * x).sin() * (b * x).exp() + (x * x + 1.0).ln();
            let j = Jet::seeded(x, 0b11);
            let jf = (j * a).sin() * (j * b).exp() + (j * j + 1.0).ln();
            let h = 1e-4;
            let fd1 = (f(x + h) - f(x - h)) / (2.0 * h);
            let fd2 = (f(x + h) - 2.0 * f(x) + f(x - h)) / (h * h);
            prop_assert!((jf.primal() - f(x)).abs() < 1e-12);
            prop_assert!((jf.coefficient(0b01) - fd1).abs() < 1e-6);
            prop_assert!((jf.coefficient(0b11) - fd2).abs() < 1e-5);
        }
    }
}
