//! # np-core
//!
//! Core types and error definitions for neuralpde-rs.
//!
//! This crate provides the building blocks shared by every other crate in the
//! workspace – numeric type aliases and the error hierarchy together with the
//! `ensure!` / `fail!` macros.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure!` / `fail!` macros.
pub mod errors;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// A time coordinate (stochastic solvers, time grids).
pub type Time = Real;

/// A collocation point: one coordinate per independent variable, in the
/// declaration order of the domain.
pub type Point = Vec<Real>;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
