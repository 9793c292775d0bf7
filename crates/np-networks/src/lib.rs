//! # np-networks
//!
//! Trial functions for the discretization engine.
//!
//! * [`Approximator`] — a parametric function `ℝⁿ → ℝᵐ` written generically
//!   over [`np_math::Scalar`], so it can be differentiated with respect to
//!   both its inputs and its parameters.
//! * [`FeedForwardNetwork`] — the reference fully connected network.
//! * [`TrialBindings`] — maps the unknown functions of a PDE system onto
//!   approximator outputs and owns the flat parameter layout.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// The approximator trait.
pub mod approximator;

/// Bindings of unknown functions to approximators.
pub mod bindings;

/// Fully connected feed-forward networks.
pub mod feed_forward;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use approximator::Approximator;
pub use bindings::TrialBindings;
pub use feed_forward::{Activation, FeedForwardNetwork};
