//! Multi-dimensional geometric Brownian motion with diagonal noise.
//!
//! ```text
//! dSᵢ = μ Sᵢ dt + σ Sᵢ dWᵢ
//! ```
//!
//! The Black–Scholes–Barenblatt test problem uses this process with `μ = r`.

use crate::stochastic_process::StochasticProcess;
use np_core::{ensure, Real, Result, Time};
use np_math::{Array, Matrix};

/// Geometric Brownian motion with constant drift and volatility.
///
/// Closed form: `Sᵢ(t) = Sᵢ(0) exp((μ − σ²/2)t + σWᵢ(t))`.
#[derive(Debug, Clone)]
pub struct GeometricBrownianMotionProcess {
    x0: Array,
    mu: Real,
    sigma: Real,
}

impl GeometricBrownianMotionProcess {
    /// Create a new GBM process.
    ///
    /// # Arguments
    /// * `x0` — initial values (each must be > 0)
    /// * `mu` — drift (growth rate)
    /// * `sigma` — volatility (must be ≥ 0)
    pub fn new(x0: Array, mu: Real, sigma: Real) -> Result<Self> {
        ensure!(!x0.is_empty(), "initial state must have at least one component");
        ensure!(
            x0.iter().all(|&v| v > 0.0 && v.is_finite()),
            "initial values must be positive, got {x0}"
        );
        ensure!(sigma >= 0.0, "volatility must be non-negative, got {sigma}");
        Ok(Self { x0, mu, sigma })
    }

    /// Drift rate.
    pub fn mu(&self) -> Real {
        self.mu
    }

    /// Volatility.
    pub fn sigma(&self) -> Real {
        self.sigma
    }
}

impl StochasticProcess for GeometricBrownianMotionProcess {
    fn size(&self) -> usize {
        self.x0.size()
    }

    fn initial_values(&self) -> Array {
        self.x0.clone()
    }

    fn drift(&self, _t: Time, x: &Array) -> Array {
        x.scale(self.mu)
    }

    fn diffusion(&self, _t: Time, x: &Array) -> Matrix {
        Matrix::from_diagonal(&x.scale(self.sigma))
    }

    /// Exact expectation: `x · exp(μ · dt)`.
    fn expectation(&self, _t: Time, x: &Array, dt: Time) -> Array {
        x.scale((self.mu * dt).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gbm() -> GeometricBrownianMotionProcess {
        GeometricBrownianMotionProcess::new(Array::from_slice(&[1.0, 0.5]), 0.05, 0.4).unwrap()
    }

    #[test]
    fn coefficients_are_proportional() {
        let p = gbm();
        let x = Array::from_slice(&[2.0, 4.0]);
        assert_relative_eq!(p.drift(0.0, &x)[1], 0.2, epsilon = 1e-15);
        let s = p.diffusion(0.0, &x);
        assert_relative_eq!(s[(0, 0)], 0.8, epsilon = 1e-15);
        assert_eq!(s[(0, 1)], 0.0);
    }

    #[test]
    fn exact_expectation() {
        let e = gbm().expectation(0.0, &Array::from_slice(&[1.0, 1.0]), 2.0);
        assert_relative_eq!(e[0], 0.1_f64.exp(), epsilon = 1e-15);
    }

    #[test]
    fn invalid_parameters() {
        assert!(GeometricBrownianMotionProcess::new(Array::from_slice(&[0.0]), 0.0, 0.1).is_err());
        assert!(GeometricBrownianMotionProcess::new(Array::from_slice(&[1.0]), 0.0, -0.1).is_err());
    }
}
