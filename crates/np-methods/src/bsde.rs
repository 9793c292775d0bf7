//! Deep BSDE solver for terminal-value problems.
//!
//! For a process `dX = μ(t,X) dt + σ(t,X) dW` on `[t₀, T]`, a running cost
//! `f(t, X, u, σᵀ∇u)` and a terminal cost `g(X_T)`, the solution `u(t₀, X₀)`
//! of the associated semilinear parabolic PDE satisfies along trajectories
//!
//! ```text
//! u(t_{n+1}) = u(t_n) − f(t_n, X_n, u_n, σᵀ∇u_n) Δt + (σᵀ∇u_n)ᵀ ΔW_n
//! ```
//!
//! A value network estimates `u(t₀, X₀)` and a gradient network estimates
//! `∇u(t, X)`; both are trained jointly so that the rolled-out value matches
//! `g(X_T)` in mean square. The two networks share one flat parameter vector,
//! value network first.

use crate::loss::{LossAssembler, TermResiduals};
use crate::monte_carlo::{terminal_statistics, Trajectory, TrajectoryGenerator};
use crate::parallel::accumulate;
use crate::training::{
    LossEvaluation, Objective, Trainer, TrainingConfig, TrainingStatus,
};
use log::{debug, warn};
use np_core::{ensure, Error, Real, Result, Time};
use np_math::{Array, Optimizer, OptimizationResult, Scalar, Statistics, Tape};
use np_networks::Approximator;
use np_processes::{SdeScheme, StochasticProcess, TimeGrid};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const TERM: &str = "terminal condition";

// ── Running cost ──────────────────────────────────────────────────────────────

/// The nonlinearity `f(t, x, u, z)` with `z = σᵀ∇u`.
pub trait RunningCost: Send + Sync {
    /// Evaluate `f`. Generic so that it can be differentiated with respect
    /// to the network parameters flowing through `u` and `z`.
    fn evaluate<S: Scalar>(&self, t: Time, x: &[Real], u: S, z: &[S]) -> S;
}

/// `f = 0`: the solution is a conditional expectation of `g(X_T)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroRunningCost;

impl RunningCost for ZeroRunningCost {
    fn evaluate<S: Scalar>(&self, _t: Time, _x: &[Real], _u: S, _z: &[S]) -> S {
        S::from_real(0.0)
    }
}

/// `f = r·u`: discounting at a constant rate.
#[derive(Debug, Clone, Copy)]
pub struct DiscountRunningCost {
    /// Discount rate `r`.
    pub rate: Real,
}

impl RunningCost for DiscountRunningCost {
    fn evaluate<S: Scalar>(&self, _t: Time, _x: &[Real], u: S, _z: &[S]) -> S {
        u * self.rate
    }
}

// ── Problem & configuration ───────────────────────────────────────────────────

type TerminalCost = Arc<dyn Fn(&[Real]) -> Real + Send + Sync>;

/// A terminal-value problem: process, costs and time span.
pub struct TerminalProblem<F> {
    process: Arc<dyn StochasticProcess>,
    running_cost: F,
    terminal_cost: TerminalCost,
    tspan: (Time, Time),
}

impl<F> fmt::Debug for TerminalProblem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalProblem")
            .field("process", &self.process)
            .field("tspan", &self.tspan)
            .finish_non_exhaustive()
    }
}

impl TerminalProblem<ZeroRunningCost> {
    /// A problem without running cost.
    pub fn new(
        process: impl StochasticProcess + 'static,
        terminal_cost: impl Fn(&[Real]) -> Real + Send + Sync + 'static,
        tspan: (Time, Time),
    ) -> Result<Self> {
        ensure!(
            tspan.0.is_finite() && tspan.1.is_finite() && tspan.0 < tspan.1,
            "time span must be finite and increasing, got {tspan:?}"
        );
        Ok(Self {
            process: Arc::new(process),
            running_cost: ZeroRunningCost,
            terminal_cost: Arc::new(terminal_cost),
            tspan,
        })
    }
}

impl<F: RunningCost> TerminalProblem<F> {
    /// Replace the running cost.
    pub fn with_running_cost<G: RunningCost>(self, running_cost: G) -> TerminalProblem<G> {
        TerminalProblem {
            process: self.process,
            running_cost,
            terminal_cost: self.terminal_cost,
            tspan: self.tspan,
        }
    }

    /// The forward process.
    pub fn process(&self) -> &dyn StochasticProcess {
        self.process.as_ref()
    }

    /// `g(x)`.
    pub fn terminal_cost(&self, x: &[Real]) -> Real {
        (self.terminal_cost)(x)
    }

    /// `(t₀, T)`.
    pub fn tspan(&self) -> (Time, Time) {
        self.tspan
    }
}

/// Settings of the trajectory simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepBsdeConfig {
    /// Time step; the last step is shortened to end exactly at `T`.
    pub dt: Time,
    /// Trajectories per training iteration.
    pub trajectories: usize,
    /// Discretization scheme of the forward process.
    #[serde(default)]
    pub scheme: SdeScheme,
}

impl Default for DeepBsdeConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            trajectories: 64,
            scheme: SdeScheme::EulerMaruyama,
        }
    }
}

impl DeepBsdeConfig {
    /// Set the time step.
    pub fn with_dt(mut self, dt: Time) -> Self {
        self.dt = dt;
        self
    }

    /// Set the batch size.
    pub fn with_trajectories(mut self, trajectories: usize) -> Self {
        self.trajectories = trajectories;
        self
    }

    /// Set the scheme.
    pub fn with_scheme(mut self, scheme: SdeScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

/// State of one trajectory at the end of a rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryState<S> {
    /// Process value.
    pub x: Array,
    /// Time.
    pub t: Time,
    /// Value estimate `u`.
    pub value: S,
    /// Accumulated `Σ f Δt`.
    pub running_cost: S,
}

// ── Solver ────────────────────────────────────────────────────────────────────

/// The deep BSDE method: a value network `U: ℝᵈ → ℝ` and a gradient network
/// `Z: ℝᵈ⁺¹ → ℝᵈ` taking `(x, t)`.
#[derive(Debug, Clone)]
pub struct DeepBsde<A> {
    value: A,
    gradient: A,
    config: DeepBsdeConfig,
}

impl<A: Approximator> DeepBsde<A> {
    /// Combine the two networks with a simulation configuration.
    pub fn new(value: A, gradient: A, config: DeepBsdeConfig) -> Self {
        Self {
            value,
            gradient,
            config,
        }
    }

    /// The simulation configuration.
    pub fn config(&self) -> &DeepBsdeConfig {
        &self.config
    }

    /// Check shapes and build the training objective for `problem`.
    pub fn discretize<F: RunningCost>(self, problem: TerminalProblem<F>) -> Result<BsdeObjective<A, F>> {
        let d = problem.process.size();
        if self.value.input_dim() != d || self.value.output_dim() != 1 {
            return Err(Error::InvalidArgument(format!(
                "value network must map {d} inputs to 1 output, it maps {} to {}",
                self.value.input_dim(),
                self.value.output_dim()
            )));
        }
        if self.gradient.input_dim() != d + 1 || self.gradient.output_dim() != d {
            return Err(Error::InvalidArgument(format!(
                "gradient network must map {} inputs (x, t) to {d} outputs, it maps {} to {}",
                d + 1,
                self.gradient.input_dim(),
                self.gradient.output_dim()
            )));
        }
        if self.config.trajectories == 0 {
            return Err(Error::InvalidArgument("at least one trajectory is needed".into()));
        }
        let grid = TimeGrid::with_step(problem.tspan.0, problem.tspan.1, self.config.dt)?;
        debug!(
            "deep BSDE: {d}-dimensional process, {} steps, {} trajectories, {:?}",
            grid.steps(),
            self.config.trajectories,
            self.config.scheme
        );
        Ok(BsdeObjective {
            solver: self,
            problem,
            grid,
            batch: Vec::new(),
            assembler: LossAssembler::default(),
        })
    }

    /// Discretize and train in one go.
    pub fn solve<F, P>(
        self,
        problem: TerminalProblem<F>,
        optimizer: &mut P,
        training: TrainingConfig,
    ) -> Result<BsdeSolution<A, F>>
    where
        F: RunningCost,
        P: Optimizer + ?Sized,
    {
        let mut objective = self.discretize(problem)?;
        let initial = objective.initial_parameters(training.seed);
        let outcome = Trainer::new(training).run(&mut objective, optimizer, initial)?;
        Ok(BsdeSolution {
            objective,
            parameters: outcome.parameters,
            status: outcome.status,
            loss_history: outcome.loss_history,
            result: outcome.result,
        })
    }
}

/// Training objective of the deep BSDE method.
#[derive(Debug)]
pub struct BsdeObjective<A, F> {
    solver: DeepBsde<A>,
    problem: TerminalProblem<F>,
    grid: TimeGrid,
    batch: Vec<Trajectory>,
    assembler: LossAssembler,
}

impl<A: Approximator, F: RunningCost> BsdeObjective<A, F> {
    /// The simulation grid.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// The current trajectory batch.
    pub fn batch(&self) -> &[Trajectory] {
        &self.batch
    }

    fn split<'p, S>(&self, params: &'p [S]) -> Result<(&'p [S], &'p [S])> {
        if params.len() != self.parameter_count() {
            return Err(Error::InvalidArgument(format!(
                "expected {} parameters, got {}",
                self.parameter_count(),
                params.len()
            )));
        }
        Ok(params.split_at(self.solver.value.parameter_count()))
    }

    /// Statistics of `g(X_T)` over the finite trajectories of the current
    /// batch. With `f = 0` the mean is a Monte Carlo estimate of `u(t₀, X₀)`.
    pub fn terminal_statistics(&self) -> Statistics {
        terminal_statistics(&self.batch, |x| self.problem.terminal_cost(x.as_slice()))
    }

    /// `u(t₀, x)` from the value network.
    pub fn value(&self, params: &Array, x: &[Real]) -> Result<Real> {
        let (pv, _) = self.split(params.as_slice())?;
        Ok(self.solver.value.apply(pv, x)?[0])
    }

    /// `∇u(t, x)` from the gradient network.
    pub fn gradient(&self, params: &Array, x: &[Real], t: Time) -> Result<Vec<Real>> {
        let (_, pg) = self.split(params.as_slice())?;
        let mut input = x.to_vec();
        input.push(t);
        self.solver.gradient.apply(pg, &input)
    }

    /// Roll the value estimate forward along `trajectory`.
    pub fn rollout<S: Scalar>(&self, params: &[S], trajectory: &Trajectory) -> Result<TrajectoryState<S>> {
        let (pv, pg) = self.split(params)?;
        let lift = |x: &Array| -> Vec<S> { x.iter().map(|&v| S::from_real(v)).collect() };
        let process = self.problem.process();

        let mut value = self.solver.value.apply(pv, &lift(trajectory.front()))?[0];
        let mut running_cost = S::from_real(0.0);
        for (i, dw) in trajectory.increments.iter().enumerate() {
            let (t, x) = (trajectory.times[i], &trajectory.values[i]);
            let dt = trajectory.times[i + 1] - t;
            let mut input = lift(x);
            input.push(S::from_real(t));
            let grad_u = self.solver.gradient.apply(pg, &input)?;

            let sigma = process.diffusion(t, x);
            let control: Vec<S> = (0..sigma.cols())
                .map(|j| {
                    (0..sigma.rows()).fold(S::from_real(0.0), |acc, k| acc + grad_u[k] * sigma[(k, j)])
                })
                .collect();
            let f = self.problem.running_cost.evaluate(t, x.as_slice(), value, &control) * dt;
            let noise = control
                .iter()
                .zip(dw.iter())
                .fold(S::from_real(0.0), |acc, (&c, &w)| acc + c * w);
            value = value - f + noise;
            running_cost = running_cost + f;
        }
        Ok(TrajectoryState {
            x: trajectory.back().clone(),
            t: trajectory.times[trajectory.times.len() - 1],
            value,
            running_cost,
        })
    }
}

impl<A: Approximator, F: RunningCost> Objective for BsdeObjective<A, F> {
    fn parameter_count(&self) -> usize {
        self.solver.value.parameter_count() + self.solver.gradient.parameter_count()
    }

    fn initial_parameters(&self, seed: u64) -> Array {
        let value = self.solver.value.initial_parameters(seed);
        let gradient = self.solver.gradient.initial_parameters(seed.wrapping_add(1));
        Array::concat(&[&value, &gradient])
    }

    /// Fresh trajectories for every iteration.
    fn prepare(&mut self, rng: &mut StdRng) -> Result<()> {
        let seed: u64 = rng.gen();
        let mut generator = TrajectoryGenerator::new(
            self.problem.process(),
            &self.grid,
            self.solver.config.scheme,
            seed,
        );
        self.batch = generator.take(self.solver.config.trajectories)?;
        let stats = self.terminal_statistics();
        if let (Some(mean), Some(lo), Some(hi)) = (stats.mean(), stats.minimum(), stats.maximum()) {
            debug!(
                "g(X_T) over {} finite paths: {mean:e} ± {:e}, range [{lo:e}, {hi:e}]",
                stats.samples(),
                stats.error_estimate().unwrap_or(0.0)
            );
        }
        Ok(())
    }

    fn evaluate(&self, params: &Array) -> Result<LossEvaluation> {
        if self.batch.is_empty() {
            return Err(Error::Precondition("no trajectories simulated".into()));
        }
        let n = params.size();
        let acc = accumulate(&self.batch, n, |trajectory| {
            if !trajectory.is_finite() {
                return Ok(None);
            }
            let tape = Tape::with_capacity(4096);
            let theta = tape.vars(params.as_slice());
            let end = self.rollout(&theta, trajectory)?;
            let residual = end.value - self.problem.terminal_cost(end.x.as_slice());
            if !residual.is_finite() {
                return Ok(None);
            }
            let squared = residual * residual;
            Ok(Some((squared.value(), tape.gradient(squared).wrt_all(&theta))))
        })?;
        let total = self.batch.len();
        if acc.discarded > 0 {
            warn!("{} of {total} trajectories diverged and were discarded", acc.discarded);
        }
        if acc.count == 0 {
            return Err(Error::DivergedTrajectories {
                diverged: acc.discarded,
                total,
            });
        }
        let term = TermResiduals {
            label: TERM.to_string(),
            count: acc.count,
            sum_squares: acc.sum,
            gradient: Array::from_vec(acc.gradient),
        };
        self.assembler.assemble_terms(&[term], params)
    }
}

/// A trained deep BSDE solution.
#[derive(Debug)]
pub struct BsdeSolution<A, F> {
    objective: BsdeObjective<A, F>,
    /// Final parameters.
    pub parameters: Array,
    /// How training ended.
    pub status: TrainingStatus,
    /// Loss per iteration.
    pub loss_history: Vec<Real>,
    /// Optimizer summary.
    pub result: OptimizationResult,
}

impl<A: Approximator, F: RunningCost> BsdeSolution<A, F> {
    /// The estimate of `u(t₀, X₀)`.
    pub fn u0(&self) -> Result<Real> {
        let x0 = self.objective.problem.process().initial_values();
        self.objective.value(&self.parameters, x0.as_slice())
    }

    /// The gradient network at `(x, t)`.
    pub fn gradient(&self, x: &[Real], t: Time) -> Result<Vec<Real>> {
        self.objective.gradient(&self.parameters, x, t)
    }

    /// The underlying objective, e.g. to roll out fresh trajectories.
    pub fn objective(&self) -> &BsdeObjective<A, F> {
        &self.objective
    }
}
