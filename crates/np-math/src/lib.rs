//! # np-math
//!
//! Mathematical utilities for neuralpde-rs: array/matrix newtypes (over
//! nalgebra), the automatic differentiation backend, random number
//! generation (via rand_mt and statrs), running statistics, and the
//! first-order optimizers used by the training loop.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Dense one-dimensional arrays.
pub mod array;

/// Automatic differentiation: scalar trait, reverse tape, Taylor jets.
pub mod autodiff;

/// Dense matrices.
pub mod matrix;

/// Gradient-based optimizers and end criteria.
pub mod optimization;

/// Random number generators.
pub mod random_numbers;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use autodiff::{Jet, Scalar, Tape, Var, MAX_DERIVATIVE_ORDER};
pub use matrix::Matrix;
pub use optimization::{
    Adam, EndCriteria, EndCriteriaType, GradientDescent, OptimizationResult, Optimizer,
};
pub use random_numbers::{InverseCumulativeNormalRng, MersenneTwisterUniformRng, SobolRsg};
pub use statistics::Statistics;
