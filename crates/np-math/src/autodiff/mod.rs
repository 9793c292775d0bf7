//! Automatic differentiation backend.
//!
//! The engine never differentiates numerically. Trial functions, residuals
//! and trajectory rollouts are written once, generically over [`Scalar`], and
//! evaluated with one of:
//!
//! * `f64` — plain evaluation;
//! * [`Var`] — reverse mode on a [`Tape`], for gradients with respect to
//!   network parameters;
//! * [`Jet`] — forward mode over nilpotent infinitesimals, for exact
//!   (mixed) partial derivatives with respect to inputs.
//!
//! The types nest: `Jet<Var<'t>>` yields input derivatives whose
//! coefficients live on a tape, so a PDE residual built from them can be
//! differentiated again with respect to the parameters.

mod jet;
mod scalar;
mod tape;

pub use jet::{Jet, MAX_DERIVATIVE_ORDER};
pub use scalar::Scalar;
pub use tape::{Gradients, Tape, Var};
