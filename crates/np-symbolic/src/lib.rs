//! # np-symbolic
//!
//! Symbolic description of a PDE problem: the [`OperatorNode`] expression
//! tree, rectangular [`Domain`]s, and the validated [`PdeSystem`] that ties
//! equations, boundary conditions and unknown functions together.
//!
//! Nothing here evaluates anything numerically beyond elementary functions;
//! the discretization engine in `np-methods` consumes these types.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Intervals, axes and box domains.
pub mod domain;

/// The operator expression tree.
pub mod operator;

/// Equations, boundary conditions and PDE systems.
pub mod system;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use domain::{Domain, DomainAxis, Interval};
pub use operator::{ElementaryFunction, OperatorNode};
pub use system::{
    BoundaryCondition, DependentVariable, Equation, Face, PdeSystem, ResolvedBoundary, Side,
};
