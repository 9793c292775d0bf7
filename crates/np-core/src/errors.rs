//! Error types for neuralpde-rs.
//!
//! Every fallible operation in the workspace returns [`Result`] with the
//! single [`Error`] enum defined here.  Structural problems (a malformed PDE
//! system, an operator the differentiation backend cannot handle) are
//! reported before training starts; numerical failures end a training run
//! with the loss history preserved by the caller.

use crate::Real;
use thiserror::Error;

/// The top-level error type used throughout neuralpde-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error (raised by `fail!`).
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated (raised by `ensure!`).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The PDE system or its discretization is structurally invalid.
    #[error("malformed system in {term}: {reason}")]
    MalformedSystem {
        /// The offending term (`"equation 0"`, `"boundary condition 2"`, ...).
        term: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An operator the differentiation backend cannot evaluate.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The loss or its gradient became non-finite.
    #[error(
        "numerical divergence at iteration {iteration} (last finite loss: {})",
        describe_loss(.last_finite_loss)
    )]
    NumericalDivergence {
        /// Iteration at which the non-finite value appeared.
        iteration: usize,
        /// The last finite loss observed before the failure, if any.
        last_finite_loss: Option<Real>,
    },

    /// Every simulated trajectory of a batch diverged.
    #[error("all {total} trajectories diverged ({diverged} non-finite)")]
    DivergedTrajectories {
        /// Number of discarded trajectories.
        diverged: usize,
        /// Batch size.
        total: usize,
    },
}

impl Error {
    /// Shorthand for a [`Error::MalformedSystem`].
    pub fn malformed(term: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSystem {
            term: term.into(),
            reason: reason.into(),
        }
    }

    /// Return `true` for errors detected before any training step can run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedSystem { .. } | Self::InvalidArgument(_) | Self::Precondition(_)
        )
    }
}

fn describe_loss(loss: &Option<Real>) -> String {
    match loss {
        Some(l) => format!("{l:e}"),
        None => "none".to_string(),
    }
}

/// Shorthand `Result` type used throughout neuralpde-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Return `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use np_core::{ensure, errors::Error};
/// fn positive(x: f64) -> np_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Return `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use np_core::{fail, errors::Error};
/// fn always_err() -> np_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_term() {
        let e = Error::malformed("boundary condition 1", "no sample points");
        assert_eq!(
            e.to_string(),
            "malformed system in boundary condition 1: no sample points"
        );
        assert!(e.is_structural());
    }

    #[test]
    fn divergence_message_reports_last_loss() {
        let e = Error::NumericalDivergence {
            iteration: 7,
            last_finite_loss: Some(0.5),
        };
        assert!(e.to_string().contains("iteration 7"));
        assert!(e.to_string().contains("5e-1"));
        assert!(!e.is_structural());

        let e = Error::NumericalDivergence {
            iteration: 0,
            last_finite_loss: None,
        };
        assert!(e.to_string().contains("none"));
    }

    #[test]
    fn ensure_macro_returns_precondition() {
        fn check(n: usize) -> Result<usize> {
            ensure!(n > 0, "n must be positive");
            Ok(n)
        }
        assert_eq!(check(0), Err(Error::Precondition("n must be positive".into())));
        assert_eq!(check(3), Ok(3));
    }
}
