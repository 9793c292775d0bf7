//! Ornstein-Uhlenbeck mean-reverting process.
//!
//! ```text
//! dX = a(b − X) dt + σ dW
//! ```
//!
//! where `a` is the speed of mean reversion, `b` is the long-run level,
//! and `σ` is the constant volatility.

use crate::stochastic_process::StochasticProcess1D;
use np_core::{ensure, Real, Result, Time};

/// An Ornstein-Uhlenbeck mean-reverting process.
///
/// The conditional expectation is exact:
/// ```text
/// E[X(t+dt) | X(t)] = level + (X(t) − level) · exp(−speed · dt)
/// ```
#[derive(Debug, Clone)]
pub struct OrnsteinUhlenbeckProcess {
    x0: Real,
    speed: Real,
    level: Real,
    volatility: Real,
}

impl OrnsteinUhlenbeckProcess {
    /// Create a new Ornstein-Uhlenbeck process.
    ///
    /// # Arguments
    /// * `speed` — mean-reversion speed `a` (must be ≥ 0)
    /// * `volatility` — diffusion coefficient `σ` (must be ≥ 0)
    /// * `x0` — initial value
    /// * `level` — long-run mean level `b`
    pub fn new(speed: Real, volatility: Real, x0: Real, level: Real) -> Result<Self> {
        ensure!(speed >= 0.0, "mean-reversion speed must be non-negative, got {speed}");
        ensure!(volatility >= 0.0, "volatility must be non-negative, got {volatility}");
        Ok(Self {
            x0,
            speed,
            level,
            volatility,
        })
    }

    /// Speed of mean reversion.
    pub fn speed(&self) -> Real {
        self.speed
    }

    /// Long-run level.
    pub fn level(&self) -> Real {
        self.level
    }
}

impl StochasticProcess1D for OrnsteinUhlenbeckProcess {
    fn x0(&self) -> Real {
        self.x0
    }

    fn drift_1d(&self, _t: Time, x: Real) -> Real {
        self.speed * (self.level - x)
    }

    fn diffusion_1d(&self, _t: Time, _x: Real) -> Real {
        self.volatility
    }

    fn expectation_1d(&self, _t: Time, x: Real, dt: Time) -> Real {
        self.level + (x - self.level) * (-self.speed * dt).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StochasticProcess;
    use np_math::Array;

    #[test]
    fn reverts_towards_level() {
        let p = OrnsteinUhlenbeckProcess::new(2.0, 0.3, 1.0, 0.0).unwrap();
        assert!((p.drift_1d(0.0, 1.0) + 2.0).abs() < 1e-15);
        let e = p.expectation(0.0, &Array::from_slice(&[1.0]), 1.0);
        assert!((e[0] - (-2.0_f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn rejects_negative_speed() {
        assert!(OrnsteinUhlenbeckProcess::new(-1.0, 0.1, 0.0, 0.0).is_err());
    }
}
