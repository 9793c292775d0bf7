//! Discretization schemes for SDE trajectories.

use crate::stochastic_process::StochasticProcess;
use np_core::{Error, Result, Time};
use np_math::Array;
use serde::{Deserialize, Serialize};

/// How a trajectory is advanced over one time step.
///
/// Both schemes take standard-normal draws `z`; the Brownian increment is
/// `ΔW = √Δt · z`. Only the drift and diffusion of the process enter the
/// step; closed-form conditional expectations are not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SdeScheme {
    /// `X + μ Δt + σ ΔW` (strong order ½).
    #[default]
    EulerMaruyama,
    /// Euler–Maruyama plus `½ σ ∂σ/∂x (ΔW² − Δt)` per component (strong
    /// order 1). Only defined for diagonal noise.
    Milstein,
}

impl SdeScheme {
    /// Advance `x` from `t` to `t + dt`.
    pub fn step<P: StochasticProcess + ?Sized>(
        &self,
        process: &P,
        t: Time,
        x: &Array,
        dt: Time,
        z: &Array,
    ) -> Result<Array> {
        if z.size() != process.factors() {
            return Err(Error::InvalidArgument(format!(
                "{} normal draws for a process with {} factors",
                z.size(),
                process.factors()
            )));
        }
        match self {
            Self::EulerMaruyama => Ok(euler_maruyama(process, t, x, dt, z)),
            Self::Milstein => milstein(process, t, x, dt, z),
        }
    }
}

fn euler_maruyama<P: StochasticProcess + ?Sized>(
    process: &P,
    t: Time,
    x: &Array,
    dt: Time,
    z: &Array,
) -> Array {
    let mut next = x.clone();
    next.axpy(dt, &process.drift(t, x));
    next.axpy(dt.sqrt(), &process.diffusion(t, x).mul_array(z));
    next
}

fn milstein<P: StochasticProcess + ?Sized>(
    process: &P,
    t: Time,
    x: &Array,
    dt: Time,
    z: &Array,
) -> Result<Array> {
    let n = process.size();
    let sigma = process.diffusion(t, x);
    let diagonal = process.factors() == n
        && (0..n).all(|i| (0..n).all(|j| i == j || sigma[(i, j)] == 0.0));
    if !diagonal {
        return Err(Error::InvalidArgument(
            "the Milstein scheme requires diagonal noise".into(),
        ));
    }

    let mu = process.drift(t, x);
    let sqrt_dt = dt.sqrt();
    let mut next = x.clone();
    for i in 0..n {
        let h = 1e-6 * x[i].abs().max(1.0);
        let mut up = x.clone();
        let mut down = x.clone();
        up[i] += h;
        down[i] -= h;
        let dsigma = (process.diffusion(t, &up)[(i, i)] - process.diffusion(t, &down)[(i, i)])
            / (2.0 * h);
        let dw = sqrt_dt * z[i];
        let s = sigma[(i, i)];
        next[i] += mu[i] * dt + s * dw + 0.5 * s * dsigma * (dw * dw - dt);
    }
    Ok(next)
}
