//! Optimization framework.
//!
//! The training loop treats an optimizer as a black box that consumes the
//! current parameters and the loss gradient and returns updated parameters.
//! Any internal state (moments, velocities) is owned by the optimizer.

mod adam;
mod gradient_descent;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;

use crate::array::Array;
use np_core::{Error, Real, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Optimizer trait ───────────────────────────────────────────────────────────

/// A first-order update rule.
pub trait Optimizer {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Return updated parameters given the gradient of the loss at `parameters`.
    fn step(&mut self, parameters: &Array, gradient: &Array) -> Result<Array>;

    /// Forget any accumulated state.
    fn reset(&mut self) {}
}

fn check_dimensions(parameters: &Array, gradient: &Array) -> Result<()> {
    if parameters.size() != gradient.size() {
        return Err(Error::InvalidArgument(format!(
            "gradient has {} entries but there are {} parameters",
            gradient.size(),
            parameters.size()
        )));
    }
    Ok(())
}

// ── End criteria ──────────────────────────────────────────────────────────────

/// Criteria to stop a training run.
///
/// All of them are checked between iterations, never during one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndCriteria {
    /// Maximum number of optimizer steps.
    pub max_iterations: usize,
    /// Stop as soon as the loss drops below this value.
    pub abstol: Real,
    /// Optional wall-clock budget.
    #[serde(default)]
    pub max_time: Option<Duration>,
}

impl EndCriteria {
    /// Create end criteria with no time budget.
    pub fn new(max_iterations: usize, abstol: Real) -> Self {
        Self {
            max_iterations,
            abstol,
            max_time: None,
        }
    }

    /// Add a wall-clock budget.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// `true` when `loss` meets the tolerance.
    pub fn is_converged(&self, loss: Real) -> bool {
        loss < self.abstol
    }
}

impl Default for EndCriteria {
    fn default() -> Self {
        Self::new(1000, 1e-10)
    }
}

/// The reason a training run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCriteriaType {
    /// Loss fell below the absolute tolerance.
    AbsoluteTolerance,
    /// A user stop criterion requested a halt.
    UserHalt,
    /// Maximum iterations reached.
    MaxIterations,
    /// Time budget exhausted.
    MaxTime,
    /// Evaluation failed.
    Failure,
}

/// Result of an optimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Final parameter values.
    pub minimizer: Array,
    /// Last loss value evaluated (`NaN` if none was).
    pub minimum: Real,
    /// Number of optimizer steps taken.
    pub iterations: usize,
    /// Reason for termination.
    pub end_type: EndCriteriaType,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gradient of f(x) = Σ (x_i − 3)².
    fn quadratic_gradient(x: &Array) -> Array {
        x.map(|v| 2.0 * (v - 3.0))
    }

    fn run<O: Optimizer>(opt: &mut O, steps: usize) -> Array {
        let mut x = Array::from_slice(&[0.0, 10.0]);
        for _ in 0..steps {
            let g = quadratic_gradient(&x);
            x = opt.step(&x, &g).unwrap();
        }
        x
    }

    #[test]
    fn gradient_descent_minimizes_quadratic() {
        let x = run(&mut GradientDescent::new(0.1), 200);
        assert!((x[0] - 3.0).abs() < 1e-6, "x = {x}");
        assert!((x[1] - 3.0).abs() < 1e-6, "x = {x}");
    }

    #[test]
    fn momentum_minimizes_quadratic() {
        let x = run(&mut GradientDescent::new(0.05).with_momentum(0.9), 500);
        assert!((x[0] - 3.0).abs() < 1e-4, "x = {x}");
    }

    #[test]
    fn adam_minimizes_quadratic() {
        let x = run(&mut Adam::new(0.1), 2000);
        assert!((x[0] - 3.0).abs() < 1e-3, "x = {x}");
        assert!((x[1] - 3.0).abs() < 1e-3, "x = {x}");
    }

    #[test]
    fn mismatched_gradient_is_rejected() {
        let mut opt = Adam::default();
        let err = opt
            .step(&Array::zeros(2), &Array::zeros(3))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn end_criteria_tolerance() {
        let ec = EndCriteria::new(10, 1e-3);
        assert!(ec.is_converged(1e-4));
        assert!(!ec.is_converged(1e-3));
        assert_eq!(ec.max_time, None);
        let ec = ec.with_max_time(Duration::from_secs(1));
        assert_eq!(ec.max_time, Some(Duration::from_secs(1)));
    }
}
