//! The training loop.
//!
//! A [`Trainer`] drives any [`Objective`] with any [`Optimizer`]:
//!
//! ```text
//! Initializing ─► Stepping ─┬─► Converged   (loss < abstol, or callback halt)
//!                  ▲    │   ├─► Exhausted   (max_iterations or max_time)
//!                  └────┘   └─► Failed      (evaluation error, non-finite loss)
//! ```
//!
//! Every iteration resamples the objective's batches if it wants to, evaluates
//! the loss and its gradient, and hands the gradient to the optimizer. Stop
//! criteria are only checked between iterations.

use log::{debug, info};
use np_core::{Error, Real, Result};
use np_math::{Array, EndCriteria, EndCriteriaType, OptimizationResult, Optimizer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// ── Objective ─────────────────────────────────────────────────────────────────

/// Loss and gradient at one parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct LossEvaluation {
    /// Total (weighted) loss.
    pub loss: Real,
    /// Gradient of `loss` with respect to the parameters.
    pub gradient: Array,
    /// Unweighted mean squared residual per term.
    pub terms: Vec<(String, Real)>,
}

/// A differentiable training objective.
pub trait Objective {
    /// Length of the parameter vector.
    fn parameter_count(&self) -> usize;

    /// Seeded starting parameters.
    fn initial_parameters(&self, seed: u64) -> Array;

    /// Called once before every evaluation; stochastic objectives redraw
    /// their batches from `rng` here.
    fn prepare(&mut self, _rng: &mut StdRng) -> Result<()> {
        Ok(())
    }

    /// Loss and gradient at `params`.
    fn evaluate(&self, params: &Array) -> Result<LossEvaluation>;
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Settings of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Stop criteria.
    pub end_criteria: EndCriteria,
    /// Report the loss through `log::info!`.
    #[serde(default)]
    pub verbose: bool,
    /// Reporting period in iterations.
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// Seed of the run's random number generator.
    #[serde(default)]
    pub seed: u64,
}

fn default_report_every() -> usize {
    100
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            end_criteria: EndCriteria::default(),
            verbose: false,
            report_every: default_report_every(),
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.end_criteria.max_iterations = max_iterations;
        self
    }

    /// Set the absolute loss tolerance.
    pub fn with_abstol(mut self, abstol: Real) -> Self {
        self.end_criteria.abstol = abstol;
        self
    }

    /// Set a wall-clock budget.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.end_criteria.max_time = Some(max_time);
        self
    }

    /// Report the loss every `report_every` iterations.
    pub fn with_verbose(mut self, report_every: usize) -> Self {
        self.verbose = true;
        self.report_every = report_every.max(1);
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Phase of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Parameters and batches are being set up.
    Initializing,
    /// Optimizer steps are being taken.
    Stepping,
    /// A stop criterion on the loss was met.
    Converged,
    /// The iteration or time budget ran out.
    Exhausted,
    /// Training ended with an error.
    Failed,
}

/// How a training run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingStatus {
    /// Loss below tolerance, or halted by the callback.
    Converged,
    /// Budget exhausted; not an error.
    Exhausted,
    /// Evaluation failed.
    Failed(Error),
}

impl TrainingStatus {
    /// The state this status corresponds to.
    pub fn state(&self) -> TrainingState {
        match self {
            Self::Converged => TrainingState::Converged,
            Self::Exhausted => TrainingState::Exhausted,
            Self::Failed(_) => TrainingState::Failed,
        }
    }

    /// The error of a failed run.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Mutable state of one training run.
#[derive(Debug)]
pub struct TrainingContext {
    /// Optimizer steps taken so far.
    pub iteration: usize,
    /// The run's random number generator.
    pub rng: StdRng,
    /// Loss of every evaluated iteration.
    pub loss_history: Vec<Real>,
    start: Instant,
    state: TrainingState,
}

impl TrainingContext {
    /// A fresh context seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            iteration: 0,
            rng: StdRng::seed_from_u64(seed),
            loss_history: Vec::new(),
            start: Instant::now(),
            state: TrainingState::Initializing,
        }
    }

    /// Current phase.
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Most recent finite loss.
    pub fn last_loss(&self) -> Option<Real> {
        self.loss_history.last().copied()
    }
}

/// Everything a training run produced.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Terminal status.
    pub status: TrainingStatus,
    /// Final parameters.
    pub parameters: Array,
    /// Loss of every evaluated iteration.
    pub loss_history: Vec<Real>,
    /// Optimizer steps taken.
    pub iterations: usize,
    /// Summary in optimizer terms.
    pub result: OptimizationResult,
}

// ── Trainer ───────────────────────────────────────────────────────────────────

type Callback<'a> = Box<dyn FnMut(&TrainingContext, &Array, Real) -> bool + 'a>;

/// Runs the training loop.
pub struct Trainer<'a> {
    config: TrainingConfig,
    callback: Option<Callback<'a>>,
}

impl std::fmt::Debug for Trainer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<'a> Trainer<'a> {
    /// A trainer with the given configuration and no callback.
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            callback: None,
        }
    }

    /// Call `callback(context, parameters, loss)` after every evaluation;
    /// returning `true` halts training as converged.
    pub fn with_callback(mut self, callback: impl FnMut(&TrainingContext, &Array, Real) -> bool + 'a) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// The configuration.
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Minimize `objective` starting from `initial`.
    ///
    /// Only a parameter vector of the wrong length is returned as `Err`;
    /// failures during training end the run with [`TrainingStatus::Failed`].
    pub fn run<O, P>(&mut self, objective: &mut O, optimizer: &mut P, initial: Array) -> Result<TrainingOutcome>
    where
        O: Objective + ?Sized,
        P: Optimizer + ?Sized,
    {
        if initial.size() != objective.parameter_count() {
            return Err(Error::InvalidArgument(format!(
                "objective has {} parameters, {} given",
                objective.parameter_count(),
                initial.size()
            )));
        }
        let criteria = self.config.end_criteria.clone();
        let mut ctx = TrainingContext::new(self.config.seed);
        let mut params = initial;
        optimizer.reset();
        debug!(
            "training {} parameters with {} for at most {} iterations",
            params.size(),
            optimizer.name(),
            criteria.max_iterations
        );
        ctx.state = TrainingState::Stepping;

        let (status, end_type) = loop {
            if ctx.iteration >= criteria.max_iterations {
                break (TrainingStatus::Exhausted, EndCriteriaType::MaxIterations);
            }
            if criteria.max_time.is_some_and(|limit| ctx.elapsed() >= limit) {
                break (TrainingStatus::Exhausted, EndCriteriaType::MaxTime);
            }
            if let Err(e) = objective.prepare(&mut ctx.rng) {
                break (TrainingStatus::Failed(e), EndCriteriaType::Failure);
            }
            let eval = match objective.evaluate(&params) {
                Ok(eval) => eval,
                Err(e) => break (TrainingStatus::Failed(e), EndCriteriaType::Failure),
            };
            if !eval.loss.is_finite() || !eval.gradient.is_finite() {
                let e = Error::NumericalDivergence {
                    iteration: ctx.iteration,
                    last_finite_loss: ctx.last_loss(),
                };
                break (TrainingStatus::Failed(e), EndCriteriaType::Failure);
            }
            ctx.loss_history.push(eval.loss);
            if self.config.verbose && ctx.iteration % self.config.report_every.max(1) == 0 {
                info!("iteration {}: loss = {:e}", ctx.iteration, eval.loss);
                for (term, mse) in &eval.terms {
                    debug!("  {term}: {mse:e}");
                }
            }
            if criteria.is_converged(eval.loss) {
                break (TrainingStatus::Converged, EndCriteriaType::AbsoluteTolerance);
            }
            if let Some(callback) = self.callback.as_mut() {
                if callback(&ctx, &params, eval.loss) {
                    break (TrainingStatus::Converged, EndCriteriaType::UserHalt);
                }
            }
            params = match optimizer.step(&params, &eval.gradient) {
                Ok(next) => next,
                Err(e) => break (TrainingStatus::Failed(e), EndCriteriaType::Failure),
            };
            ctx.iteration += 1;
        };

        ctx.state = status.state();
        match &status {
            TrainingStatus::Failed(e) => info!("training failed after {} iterations: {e}", ctx.iteration),
            _ => info!(
                "training ended ({:?}) after {} iterations, loss = {:e}",
                ctx.state,
                ctx.iteration,
                ctx.last_loss().unwrap_or(Real::NAN)
            ),
        }
        Ok(TrainingOutcome {
            result: OptimizationResult {
                minimizer: params.clone(),
                minimum: ctx.last_loss().unwrap_or(Real::NAN),
                iterations: ctx.iteration,
                end_type,
            },
            status,
            parameters: params,
            iterations: ctx.iteration,
            loss_history: ctx.loss_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_math::{Adam, GradientDescent};
    use rand::Rng;

    /// `f(θ) = Σ (θᵢ − c)²` with an optional random shift of `c` per iteration.
    struct Quadratic {
        centre: Real,
        noisy: bool,
        shift: Real,
    }

    impl Quadratic {
        fn new(centre: Real) -> Self {
            Self {
                centre,
                noisy: false,
                shift: 0.0,
            }
        }
    }

    impl Objective for Quadratic {
        fn parameter_count(&self) -> usize {
            2
        }
        fn initial_parameters(&self, _seed: u64) -> Array {
            Array::zeros(2)
        }
        fn prepare(&mut self, rng: &mut StdRng) -> Result<()> {
            if self.noisy {
                self.shift = rng.gen_range(-0.1..0.1);
            }
            Ok(())
        }
        fn evaluate(&self, params: &Array) -> Result<LossEvaluation> {
            let c = self.centre + self.shift;
            Ok(LossEvaluation {
                loss: params.iter().map(|p| (p - c).powi(2)).sum(),
                gradient: params.map(|p| 2.0 * (p - c)),
                terms: vec![],
            })
        }
    }

    #[test]
    fn converges_below_tolerance() {
        let mut trainer = Trainer::new(TrainingConfig::default().with_abstol(1e-12));
        let mut objective = Quadratic::new(3.0);
        let outcome = trainer
            .run(&mut objective, &mut GradientDescent::new(0.25), Array::zeros(2))
            .unwrap();
        assert_eq!(outcome.status, TrainingStatus::Converged);
        assert_eq!(outcome.result.end_type, EndCriteriaType::AbsoluteTolerance);
        assert!(outcome.result.minimum < 1e-12);
        assert_eq!(outcome.loss_history.len(), outcome.iterations + 1);
    }

    #[test]
    fn zero_iterations_is_exhausted_immediately() {
        let mut trainer = Trainer::new(TrainingConfig::default().with_max_iterations(0));
        let initial = Array::from_slice(&[1.0, 2.0]);
        let outcome = trainer
            .run(&mut Quadratic::new(3.0), &mut Adam::new(0.1), initial.clone())
            .unwrap();
        assert_eq!(outcome.status, TrainingStatus::Exhausted);
        assert_eq!(outcome.parameters, initial);
        assert!(outcome.loss_history.is_empty());
        assert_eq!(outcome.result.end_type, EndCriteriaType::MaxIterations);
    }

    #[test]
    fn callback_halts() {
        let mut seen = 0;
        let outcome = Trainer::new(TrainingConfig::default())
            .with_callback(|ctx, _, _| {
                seen += 1;
                ctx.iteration == 4
            })
            .run(&mut Quadratic::new(3.0), &mut GradientDescent::new(0.01), Array::zeros(2))
            .unwrap();
        assert_eq!(outcome.status, TrainingStatus::Converged);
        assert_eq!(outcome.result.end_type, EndCriteriaType::UserHalt);
        assert_eq!(outcome.iterations, 4);
        assert_eq!(seen, 5);
    }

    #[test]
    fn divergence_reports_last_finite_loss() {
        // Step size 1.5 on a quadratic overshoots geometrically.
        let config = TrainingConfig::default().with_max_iterations(100_000);
        let outcome = Trainer::new(config)
            .run(&mut Quadratic::new(1.0), &mut GradientDescent::new(1.5), Array::zeros(2))
            .unwrap();
        match outcome.status {
            TrainingStatus::Failed(Error::NumericalDivergence {
                iteration,
                last_finite_loss,
            }) => {
                assert_eq!(iteration, outcome.loss_history.len());
                assert_eq!(last_finite_loss, outcome.loss_history.last().copied());
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn seeded_runs_are_identical() {
        let run = |seed| {
            let mut objective = Quadratic {
                noisy: true,
                ..Quadratic::new(1.0)
            };
            Trainer::new(TrainingConfig::default().with_max_iterations(50).with_seed(seed))
                .run(&mut objective, &mut Adam::new(0.05), Array::zeros(2))
                .unwrap()
                .loss_history
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let err = Trainer::new(TrainingConfig::default())
            .run(&mut Quadratic::new(0.0), &mut Adam::default(), Array::zeros(3))
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TrainingConfig::default()
            .with_max_time(Duration::from_secs(5))
            .with_verbose(10)
            .with_seed(3);
        let json = serde_json::to_string(&config).unwrap();
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
