//! `StochasticProcess` — base traits for stochastic processes.
//!
//! A stochastic process `dX = μ(t,X) dt + σ(t,X) dW` is described by its
//! drift (`μ`), diffusion (`σ`), and an evolve method that advances the state.

use np_core::{Real, Time};
use np_math::{Array, Matrix};

/// A general multi-dimensional stochastic process.
pub trait StochasticProcess: std::fmt::Debug + Send + Sync {
    /// Number of dimensions.
    fn size(&self) -> usize;

    /// Number of independent Brownian motions driving the process.
    fn factors(&self) -> usize {
        self.size()
    }

    /// Initial value(s) of the process.
    fn initial_values(&self) -> Array;

    /// Drift vector `μ(t, x)`.
    fn drift(&self, t: Time, x: &Array) -> Array;

    /// Diffusion matrix `σ(t, x)`, dimensioned `size() × factors()`.
    fn diffusion(&self, t: Time, x: &Array) -> Matrix;

    /// Expectation `E[x(t+Δt) | x(t)]`.
    ///
    /// Default: first-order Euler `x + μ(t,x)·Δt`.
    fn expectation(&self, t: Time, x: &Array, dt: Time) -> Array {
        let mut result = x.clone();
        result.axpy(dt, &self.drift(t, x));
        result
    }

    /// Standard deviation: `σ(t,x) · √Δt`.
    ///
    /// Returns a `size() × factors()` matrix.
    fn std_deviation(&self, t: Time, x: &Array, dt: Time) -> Matrix {
        let mut result = self.diffusion(t, x);
        result.scale_mut(dt.sqrt());
        result
    }

    /// Advance the state from its conditional expectation, driven by
    /// standard normals `dw`. Processes with an exact expectation override
    /// [`expectation`](Self::expectation); [`SdeScheme`](crate::SdeScheme)
    /// steps use only the drift and diffusion.
    ///
    /// `x(t+Δt) = E[x(t+Δt)|x(t)] + σ·√Δt · dw`
    fn evolve(&self, t: Time, x: &Array, dt: Time, dw: &Array) -> Array {
        let mut result = self.expectation(t, x, dt);
        result += &self.std_deviation(t, x, dt).mul_array(dw);
        result
    }
}

/// A 1-dimensional stochastic process `dX = μ(t,X) dt + σ(t,X) dW`.
///
/// Provides scalar versions of drift, diffusion, etc.
pub trait StochasticProcess1D: std::fmt::Debug + Send + Sync {
    /// Initial value of the process.
    fn x0(&self) -> Real;

    /// 1D drift `μ(t, x)`.
    fn drift_1d(&self, t: Time, x: Real) -> Real;

    /// 1D diffusion `σ(t, x)`.
    fn diffusion_1d(&self, t: Time, x: Real) -> Real;

    /// Expected value `E[x(t+Δt) | x(t) = x]`.
    fn expectation_1d(&self, t: Time, x: Real, dt: Time) -> Real {
        x + self.drift_1d(t, x) * dt
    }

    /// Standard deviation `σ(t,x) · √Δt`.
    fn std_deviation_1d(&self, t: Time, x: Real, dt: Time) -> Real {
        self.diffusion_1d(t, x) * dt.sqrt()
    }

    /// Euler step: `E + σ·√Δt · dw`.
    fn evolve_1d(&self, t: Time, x: Real, dt: Time, dw: Real) -> Real {
        self.expectation_1d(t, x, dt) + self.std_deviation_1d(t, x, dt) * dw
    }

    /// Variance of the process over `Δt`.
    fn variance_1d(&self, t: Time, x: Real, dt: Time) -> Real {
        let s = self.diffusion_1d(t, x);
        s * s * dt
    }
}

/// Any 1D process is also a multi-dimensional process of size 1.
impl<T: StochasticProcess1D> StochasticProcess for T {
    fn size(&self) -> usize {
        1
    }

    fn factors(&self) -> usize {
        1
    }

    fn initial_values(&self) -> Array {
        Array::from_vec(vec![self.x0()])
    }

    fn drift(&self, t: Time, x: &Array) -> Array {
        Array::from_vec(vec![self.drift_1d(t, x[0])])
    }

    fn diffusion(&self, t: Time, x: &Array) -> Matrix {
        let mut m = Matrix::zeros(1, 1);
        m[(0, 0)] = self.diffusion_1d(t, x[0]);
        m
    }

    fn expectation(&self, t: Time, x: &Array, dt: Time) -> Array {
        Array::from_vec(vec![self.expectation_1d(t, x[0], dt)])
    }

    fn std_deviation(&self, t: Time, x: &Array, dt: Time) -> Matrix {
        let mut m = Matrix::zeros(1, 1);
        m[(0, 0)] = self.std_deviation_1d(t, x[0], dt);
        m
    }

    fn evolve(&self, t: Time, x: &Array, dt: Time, dw: &Array) -> Array {
        Array::from_vec(vec![self.evolve_1d(t, x[0], dt, dw[0])])
    }
}
