//! Trajectory simulation.
//!
//! * [`Trajectory`]: one realisation of a process on a time grid, together
//!   with the Brownian increments that drove it
//! * [`TrajectoryGenerator`]: simulates trajectories with a chosen
//!   [`SdeScheme`] from a seeded normal stream
//! * [`terminal_statistics`]: Monte Carlo summary of a terminal functional

use np_core::{Real, Result, Time};
use np_math::{Array, InverseCumulativeNormalRng, Statistics};
use np_processes::{SdeScheme, StochasticProcess, TimeGrid};

// ─── Trajectory ───────────────────────────────────────────────────────────────

/// A sample path of a multi-dimensional process.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Grid times, including the start.
    pub times: Vec<Time>,
    /// Process state at each time.
    pub values: Vec<Array>,
    /// `increments[i]` is the Brownian increment `ΔW` over step `i`.
    pub increments: Vec<Array>,
}

impl Trajectory {
    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.increments.len()
    }

    /// The initial state.
    pub fn front(&self) -> &Array {
        &self.values[0]
    }

    /// The terminal state.
    pub fn back(&self) -> &Array {
        &self.values[self.values.len() - 1]
    }

    /// `true` when every state is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(Array::is_finite)
    }
}

// ─── TrajectoryGenerator ──────────────────────────────────────────────────────

/// Simulates trajectories of a process on a fixed time grid.
pub struct TrajectoryGenerator<'a, P: ?Sized> {
    process: &'a P,
    grid: &'a TimeGrid,
    scheme: SdeScheme,
    rng: InverseCumulativeNormalRng,
}

impl<'a, P: StochasticProcess + ?Sized> TrajectoryGenerator<'a, P> {
    /// Create a generator whose normal draws are seeded with `seed`.
    pub fn new(process: &'a P, grid: &'a TimeGrid, scheme: SdeScheme, seed: u64) -> Self {
        Self {
            process,
            grid,
            scheme,
            rng: InverseCumulativeNormalRng::new(seed),
        }
    }

    /// Generate one trajectory.
    ///
    /// A state that becomes non-finite is carried to the end of the grid so
    /// that every trajectory consumes the same number of draws; callers
    /// decide what to do with it through [`Trajectory::is_finite`].
    pub fn next_trajectory(&mut self) -> Result<Trajectory> {
        let steps = self.grid.steps();
        let factors = self.process.factors();
        let mut values = Vec::with_capacity(steps + 1);
        let mut increments = Vec::with_capacity(steps);

        let mut x = self.process.initial_values();
        values.push(x.clone());
        let mut z = vec![0.0; factors];
        for i in 0..steps {
            let (t, dt) = (self.grid.time(i), self.grid.dt(i));
            self.rng.fill(&mut z);
            let draws = Array::from_slice(&z);
            x = self.scheme.step(self.process, t, &x, dt, &draws)?;
            values.push(x.clone());
            increments.push(draws.scale(dt.sqrt()));
        }

        Ok(Trajectory {
            times: self.grid.times().to_vec(),
            values,
            increments,
        })
    }

    /// Generate `count` trajectories.
    pub fn take(&mut self, count: usize) -> Result<Vec<Trajectory>> {
        (0..count).map(|_| self.next_trajectory()).collect()
    }
}

/// Statistics of `f(X_T)` over the trajectories that stayed finite.
pub fn terminal_statistics(trajectories: &[Trajectory], f: impl Fn(&Array) -> Real) -> Statistics {
    let mut stats = Statistics::new();
    for t in trajectories.iter().filter(|t| t.is_finite()) {
        stats.add(f(t.back()));
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use np_processes::{GeometricBrownianMotionProcess, OrnsteinUhlenbeckProcess, ScaledBrownianMotion};

    #[test]
    fn trajectory_shape() {
        let process = ScaledBrownianMotion::standard(3).unwrap();
        let grid = TimeGrid::with_step(0.0, 1.0, 0.3).unwrap();
        let mut gen = TrajectoryGenerator::new(&process, &grid, SdeScheme::EulerMaruyama, 42);
        let t = gen.next_trajectory().unwrap();
        assert_eq!(t.steps(), 4);
        assert_eq!(t.values.len(), 5);
        assert_eq!(t.times, grid.times());
        assert_eq!(t.front(), &Array::zeros(3));
        assert!(t.is_finite());
        // Standard BM: X_T is the sum of the increments.
        let mut sum = Array::zeros(3);
        for dw in &t.increments {
            sum += dw;
        }
        for j in 0..3 {
            assert_relative_eq!(t.back()[j], sum[j], epsilon = 1e-12);
        }
    }

    #[test]
    fn same_seed_same_trajectories() {
        let process = ScaledBrownianMotion::standard(2).unwrap();
        let grid = TimeGrid::uniform(0.0, 1.0, 10).unwrap();
        let a = TrajectoryGenerator::new(&process, &grid, SdeScheme::EulerMaruyama, 7).take(5).unwrap();
        let b = TrajectoryGenerator::new(&process, &grid, SdeScheme::EulerMaruyama, 7).take(5).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn brownian_terminal_variance() {
        let process = ScaledBrownianMotion::new(Array::from_slice(&[1.0]), 0.5, 2.0).unwrap();
        let grid = TimeGrid::uniform(0.0, 1.0, 4).unwrap();
        let mut gen = TrajectoryGenerator::new(&process, &grid, SdeScheme::EulerMaruyama, 1);
        let mut stats = Statistics::new();
        for _ in 0..20_000 {
            stats.add(gen.next_trajectory().unwrap().back()[0]);
        }
        assert_relative_eq!(stats.mean().unwrap(), 1.5, epsilon = 0.05);
        assert_relative_eq!(stats.variance().unwrap(), 4.0, epsilon = 0.15);
    }

    #[test]
    fn gbm_terminal_mean() {
        let process =
            GeometricBrownianMotionProcess::new(Array::from_slice(&[100.0]), 0.05, 0.2).unwrap();
        let grid = TimeGrid::uniform(0.0, 1.0, 50).unwrap();
        let trajectories = TrajectoryGenerator::new(&process, &grid, SdeScheme::Milstein, 3)
            .take(10_000)
            .unwrap();
        let stats = terminal_statistics(&trajectories, |x| x[0]);
        assert_eq!(stats.samples(), 10_000);
        assert_relative_eq!(stats.mean().unwrap(), 100.0 * 0.05_f64.exp(), max_relative = 0.01);
        // sd of S_T is about 21, so the standard error is about 0.21.
        assert_relative_eq!(stats.error_estimate().unwrap(), 0.21, max_relative = 0.1);
        assert!(stats.minimum().unwrap() > 0.0);
    }

    #[test]
    fn one_dimensional_processes_are_simulated_through_the_blanket_impl() {
        let process = OrnsteinUhlenbeckProcess::new(1.0, 0.0, 2.0, 0.5).unwrap();
        let grid = TimeGrid::uniform(0.0, 3.0, 300).unwrap();
        let t = TrajectoryGenerator::new(&process, &grid, SdeScheme::EulerMaruyama, 0)
            .next_trajectory()
            .unwrap();
        // Zero volatility: deterministic decay towards the level.
        let exact = 0.5 + (2.0 - 0.5) * (-3.0_f64).exp();
        assert_relative_eq!(t.back()[0], exact, epsilon = 1e-2);
    }
}
