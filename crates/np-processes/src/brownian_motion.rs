//! Arithmetic Brownian motion with constant coefficients.
//!
//! ```text
//! dXᵢ = μ dt + σ dWᵢ
//! ```

use crate::stochastic_process::StochasticProcess;
use np_core::{ensure, Real, Result, Time};
use np_math::{Array, Matrix};

/// `d` independent Brownian motions sharing a drift and a volatility.
///
/// With `μ = σ = 0` every trajectory stays at `x0`.
#[derive(Debug, Clone)]
pub struct ScaledBrownianMotion {
    x0: Array,
    mu: Real,
    sigma: Real,
}

impl ScaledBrownianMotion {
    /// Create the process started at `x0`.
    pub fn new(x0: Array, mu: Real, sigma: Real) -> Result<Self> {
        ensure!(!x0.is_empty(), "initial state must have at least one component");
        ensure!(x0.is_finite(), "initial state must be finite");
        ensure!(sigma >= 0.0, "volatility must be non-negative, got {sigma}");
        Ok(Self { x0, mu, sigma })
    }

    /// Standard Brownian motion in `dimension` dimensions started at zero.
    pub fn standard(dimension: usize) -> Result<Self> {
        Self::new(Array::zeros(dimension), 0.0, 1.0)
    }
}

impl StochasticProcess for ScaledBrownianMotion {
    fn size(&self) -> usize {
        self.x0.size()
    }

    fn initial_values(&self) -> Array {
        self.x0.clone()
    }

    fn drift(&self, _t: Time, _x: &Array) -> Array {
        Array::from_element(self.size(), self.mu)
    }

    fn diffusion(&self, _t: Time, _x: &Array) -> Matrix {
        Matrix::from_diagonal(&Array::from_element(self.size(), self.sigma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coefficients_freeze_the_state() {
        let p = ScaledBrownianMotion::new(Array::from_slice(&[0.5, -1.0]), 0.0, 0.0).unwrap();
        let x = p.evolve(0.0, &p.initial_values(), 0.1, &Array::from_slice(&[1.3, -0.2]));
        assert_eq!(x, p.initial_values());
        assert!(p.diffusion(0.0, &x).is_zero());
    }

    #[test]
    fn euler_step() {
        let p = ScaledBrownianMotion::new(Array::zeros(2), 1.0, 2.0).unwrap();
        let x = p.evolve(0.0, &Array::zeros(2), 0.25, &Array::from_slice(&[1.0, -1.0]));
        assert!((x[0] - 1.25).abs() < 1e-15);
        assert!((x[1] + 0.75).abs() < 1e-15);
    }

    #[test]
    fn rejects_negative_volatility() {
        assert!(ScaledBrownianMotion::new(Array::zeros(1), 0.0, -1.0).is_err());
        assert!(ScaledBrownianMotion::standard(0).is_err());
    }
}
