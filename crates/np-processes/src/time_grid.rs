//! Time grids for trajectory simulation.

use np_core::{ensure, Real, Result, Time};

/// Relative tolerance for landing on the end of a grid.
const END_TOLERANCE: Real = 1e-9;

/// A strictly increasing sequence of time points.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<Time>,
    dts: Vec<Time>,
}

impl TimeGrid {
    /// Uniform grid from `start` to `end` with `steps` intervals.
    pub fn uniform(start: Time, end: Time, steps: usize) -> Result<Self> {
        ensure!(steps > 0, "a time grid needs at least one step");
        ensure!(
            start.is_finite() && end.is_finite() && end > start,
            "time span [{start}, {end}] is empty or not finite"
        );
        let dt = (end - start) / steps as Real;
        let mut times: Vec<Time> = (0..=steps).map(|i| start + i as Real * dt).collect();
        times[steps] = end;
        Ok(Self::from_sorted(times))
    }

    /// Grid of step `dt` from `start`; the last step is shortened so the
    /// grid ends exactly at `end`.
    pub fn with_step(start: Time, end: Time, dt: Time) -> Result<Self> {
        ensure!(dt > 0.0 && dt.is_finite(), "time step must be positive, got {dt}");
        ensure!(
            start.is_finite() && end.is_finite() && end > start,
            "time span [{start}, {end}] is empty or not finite"
        );
        let span = end - start;
        let tolerance = END_TOLERANCE * span;
        let mut times = vec![start];
        let mut i = 1;
        loop {
            let t = start + i as Real * dt;
            if t >= end - tolerance {
                times.push(end);
                break;
            }
            times.push(t);
            i += 1;
        }
        Ok(Self::from_sorted(times))
    }

    fn from_sorted(times: Vec<Time>) -> Self {
        let dts = times.windows(2).map(|w| w[1] - w[0]).collect();
        Self { times, dts }
    }

    /// Number of time points (= steps + 1).
    pub fn size(&self) -> usize {
        self.times.len()
    }

    /// Number of steps (= time points − 1).
    pub fn steps(&self) -> usize {
        self.dts.len()
    }

    /// Time at index `i`.
    pub fn time(&self, i: usize) -> Time {
        self.times[i]
    }

    /// Time step between index `i` and `i+1`.
    pub fn dt(&self, i: usize) -> Time {
        self.dts[i]
    }

    /// First time.
    pub fn start(&self) -> Time {
        self.times[0]
    }

    /// Final time.
    pub fn end(&self) -> Time {
        self.times[self.times.len() - 1]
    }

    /// All time points.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// All time steps.
    pub fn dts(&self) -> &[Time] {
        &self.dts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn uniform_grid() {
        let g = TimeGrid::uniform(0.0, 1.0, 4).unwrap();
        assert_eq!(g.size(), 5);
        assert_eq!(g.steps(), 4);
        assert_eq!(g.time(0), 0.0);
        assert_eq!(g.end(), 1.0);
        assert!((g.dt(0) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn last_step_is_shortened() {
        let g = TimeGrid::with_step(0.0, 1.0, 0.3).unwrap();
        assert_eq!(g.steps(), 4);
        assert!((g.dt(3) - 0.1).abs() < 1e-12);
        assert_eq!(g.end(), 1.0);
    }

    #[test]
    fn exact_multiple_has_no_sliver() {
        let g = TimeGrid::with_step(0.0, 1.0, 0.1).unwrap();
        assert_eq!(g.steps(), 10);
        assert_eq!(g.end(), 1.0);
    }

    #[test]
    fn invalid_grids() {
        assert!(TimeGrid::uniform(0.0, 1.0, 0).is_err());
        assert!(TimeGrid::with_step(1.0, 1.0, 0.1).is_err());
        assert!(TimeGrid::with_step(0.0, 1.0, 0.0).is_err());
        assert!(TimeGrid::with_step(0.0, 1.0, Real::NAN).is_err());
    }

    proptest! {
        #[test]
        fn grid_covers_span(start in -5.0..5.0_f64, len in 0.01..10.0_f64, dt in 0.001..1.0_f64) {
            let g = TimeGrid::with_step(start, start + len, dt).unwrap();
            prop_assert_eq!(g.start(), start);
            prop_assert_eq!(g.end(), start + len);
            let total: Real = g.dts().iter().sum();
            prop_assert!((total - len).abs() < 1e-9 * len.max(1.0));
            prop_assert!(g.dts().iter().all(|&h| h > 0.0 && h <= dt + 1e-8));
        }
    }
}
