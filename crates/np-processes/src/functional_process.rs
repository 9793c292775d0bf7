//! A process defined by user-supplied drift and diffusion closures.

use crate::stochastic_process::StochasticProcess;
use np_core::{ensure, Result, Time};
use np_math::{Array, Matrix};
use std::fmt;
use std::sync::Arc;

type DriftFn = Arc<dyn Fn(Time, &Array) -> Array + Send + Sync>;
type DiffusionFn = Arc<dyn Fn(Time, &Array) -> Matrix + Send + Sync>;

/// `dX = μ(t, X) dt + σ(t, X) dW` with arbitrary `μ` and `σ`.
///
/// ```
/// use np_math::{Array, Matrix};
/// use np_processes::{FunctionalProcess, StochasticProcess};
///
/// let p = FunctionalProcess::new(
///     Array::from_slice(&[1.0]),
///     1,
///     |_, x| x.scale(-1.0),
///     |_, _| Matrix::identity(1),
/// )
/// .unwrap();
/// assert_eq!(p.drift(0.0, &p.initial_values())[0], -1.0);
/// ```
#[derive(Clone)]
pub struct FunctionalProcess {
    x0: Array,
    factors: usize,
    drift: DriftFn,
    diffusion: DiffusionFn,
}

impl FunctionalProcess {
    /// Create the process; `diffusion` must return `x0.size() × factors`
    /// matrices.
    pub fn new(
        x0: Array,
        factors: usize,
        drift: impl Fn(Time, &Array) -> Array + Send + Sync + 'static,
        diffusion: impl Fn(Time, &Array) -> Matrix + Send + Sync + 'static,
    ) -> Result<Self> {
        ensure!(!x0.is_empty(), "initial state must have at least one component");
        ensure!(factors > 0, "a process needs at least one Brownian factor");
        let probe_mu = drift(0.0, &x0);
        let probe_sigma = diffusion(0.0, &x0);
        ensure!(
            probe_mu.size() == x0.size(),
            "drift returns {} components for a state of size {}",
            probe_mu.size(),
            x0.size()
        );
        ensure!(
            probe_sigma.rows() == x0.size() && probe_sigma.cols() == factors,
            "diffusion returns a {}×{} matrix, expected {}×{factors}",
            probe_sigma.rows(),
            probe_sigma.cols(),
            x0.size()
        );
        Ok(Self {
            x0,
            factors,
            drift: Arc::new(drift),
            diffusion: Arc::new(diffusion),
        })
    }
}

impl fmt::Debug for FunctionalProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalProcess")
            .field("x0", &self.x0)
            .field("factors", &self.factors)
            .finish_non_exhaustive()
    }
}

impl StochasticProcess for FunctionalProcess {
    fn size(&self) -> usize {
        self.x0.size()
    }

    fn factors(&self) -> usize {
        self.factors
    }

    fn initial_values(&self) -> Array {
        self.x0.clone()
    }

    fn drift(&self, t: Time, x: &Array) -> Array {
        (self.drift)(t, x)
    }

    fn diffusion(&self, t: Time, x: &Array) -> Matrix {
        (self.diffusion)(t, x)
    }
}
