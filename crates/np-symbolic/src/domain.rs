//! Rectangular domains.
//!
//! A [`Domain`] is a Cartesian product of closed intervals, one per
//! independent variable, in declaration order. That order is the coordinate
//! order of every collocation point.

use np_core::{Error, Real, Result};
use serde::{Deserialize, Serialize};

// ── Interval ──────────────────────────────────────────────────────────────────

/// A closed interval `[lower, upper]`.
///
/// `lower == upper` is a valid, degenerate interval (a zero-measure axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds", into = "IntervalBounds")]
pub struct Interval {
    lower: Real,
    upper: Real,
}

#[derive(Serialize, Deserialize)]
struct IntervalBounds {
    lower: Real,
    upper: Real,
}

impl TryFrom<IntervalBounds> for Interval {
    type Error = Error;

    fn try_from(b: IntervalBounds) -> Result<Self> {
        Interval::new(b.lower, b.upper)
    }
}

impl From<Interval> for IntervalBounds {
    fn from(i: Interval) -> Self {
        Self {
            lower: i.lower,
            upper: i.upper,
        }
    }
}

impl Interval {
    /// Create `[lower, upper]`, rejecting reversed or non-finite bounds.
    pub fn new(lower: Real, upper: Real) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "interval bounds must be finite, got [{lower}, {upper}]"
            )));
        }
        if lower > upper {
            return Err(Error::InvalidArgument(format!(
                "interval lower bound {lower} exceeds upper bound {upper}"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Lower bound.
    pub fn lower(&self) -> Real {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> Real {
        self.upper
    }

    /// `upper − lower`.
    pub fn span(&self) -> Real {
        self.upper - self.lower
    }

    /// `true` for `lower == upper`.
    pub fn is_degenerate(&self) -> bool {
        self.lower == self.upper
    }

    /// Membership test with an absolute tolerance.
    pub fn contains(&self, x: Real, tolerance: Real) -> bool {
        x >= self.lower - tolerance && x <= self.upper + tolerance
    }

    /// Affine map of `u ∈ [0, 1]` onto the interval.
    pub fn map_unit(&self, u: Real) -> Real {
        self.lower + u * self.span()
    }
}

// ── Axis & domain ─────────────────────────────────────────────────────────────

/// One independent variable and its range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAxis {
    /// Variable name.
    pub variable: String,
    /// Range of the variable.
    pub interval: Interval,
}

impl DomainAxis {
    /// Create an axis for `variable ∈ [lower, upper]`.
    pub fn new(variable: impl Into<String>, lower: Real, upper: Real) -> Result<Self> {
        Ok(Self {
            variable: variable.into(),
            interval: Interval::new(lower, upper)?,
        })
    }
}

/// A box-shaped domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    axes: Vec<DomainAxis>,
}

impl Domain {
    /// Build a domain from its axes. Variable names must be distinct.
    pub fn new(axes: Vec<DomainAxis>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::InvalidArgument(
                "a domain needs at least one axis".into(),
            ));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|a| a.variable == axis.variable) {
                return Err(Error::InvalidArgument(format!(
                    "variable '{}' declared twice in domain",
                    axis.variable
                )));
            }
        }
        Ok(Self { axes })
    }

    /// Number of independent variables.
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// The axes in declaration order.
    pub fn axes(&self) -> &[DomainAxis] {
        &self.axes
    }

    /// Position of `variable` in the coordinate order.
    pub fn index_of(&self, variable: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.variable == variable)
    }

    /// The axis for `variable`.
    pub fn axis(&self, variable: &str) -> Option<&DomainAxis> {
        self.axes.iter().find(|a| a.variable == variable)
    }

    /// Variable names in coordinate order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|a| a.variable.as_str())
    }
}
