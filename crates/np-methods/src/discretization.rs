//! Physics-informed neural network discretization.
//!
//! [`PhysicsInformedNN`] turns a [`PdeSystem`] and a set of trial functions
//! into a [`PinnObjective`]: every equation is imposed on interior
//! collocation points, every boundary condition on points of its
//! sub-domain, and optional data terms pull the trial functions towards
//! observed values. Structural problems (unbound functions, arity mismatches,
//! unsupported derivative orders, empty terms) are reported here, before any
//! training step runs.

use crate::loss::{LossAssembler, LossWeights, TermResiduals};
use crate::parallel::accumulate;
use crate::residual::{CompiledResidual, ResidualEvaluator};
use crate::sampling::{DomainSampler, SamplingStrategy};
use crate::training::{LossEvaluation, Objective, Trainer, TrainingConfig, TrainingStatus};
use log::debug;
use np_core::{Error, Point, Real, Result};
use np_math::{Array, OptimizationResult, Optimizer, Scalar, Tape};
use np_networks::{Approximator, TrialBindings};
use np_symbolic::{OperatorNode, PdeSystem};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Observed values of one unknown function.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTerm {
    /// The unknown function.
    pub function: String,
    /// Function arguments, one vector per observation.
    pub inputs: Vec<Point>,
    /// Observed values.
    pub targets: Vec<Real>,
}

impl DataTerm {
    /// Observations `function(inputs[i]) ≈ targets[i]`.
    pub fn new(function: impl Into<String>, inputs: Vec<Point>, targets: Vec<Real>) -> Result<Self> {
        let function = function.into();
        if inputs.len() != targets.len() {
            return Err(Error::InvalidArgument(format!(
                "data for '{function}' has {} inputs and {} targets",
                inputs.len(),
                targets.len()
            )));
        }
        Ok(Self {
            function,
            inputs,
            targets,
        })
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Configuration of the physics-informed discretization.
///
/// ```
/// use np_methods::{PhysicsInformedNN, SamplingStrategy};
/// use np_networks::{Activation, FeedForwardNetwork, TrialBindings};
///
/// let net = FeedForwardNetwork::new(&[1, 16, 1], Activation::Tanh).unwrap();
/// let pinn = PhysicsInformedNN::new(TrialBindings::shared(net, &["u"]).unwrap())
///     .with_strategy(SamplingStrategy::grid(0.05));
/// assert_eq!(pinn.strategy(), &SamplingStrategy::grid(0.05));
/// ```
#[derive(Debug, Clone)]
pub struct PhysicsInformedNN<A> {
    bindings: TrialBindings<A>,
    strategy: SamplingStrategy,
    boundary_strategy: Option<SamplingStrategy>,
    weights: LossWeights,
    data: Vec<DataTerm>,
    initial_parameters: Option<Array>,
}

impl<A: Approximator> PhysicsInformedNN<A> {
    /// Default grid sampling, unit weights.
    pub fn new(bindings: TrialBindings<A>) -> Self {
        Self {
            bindings,
            strategy: SamplingStrategy::default(),
            boundary_strategy: None,
            weights: LossWeights::default(),
            data: Vec::new(),
            initial_parameters: None,
        }
    }

    /// Sampling strategy for the interior (and the boundary, unless set
    /// separately).
    pub fn with_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Separate sampling strategy for boundary conditions.
    pub fn with_boundary_strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.boundary_strategy = Some(strategy);
        self
    }

    /// Per-term weights and regularization.
    pub fn with_weights(mut self, weights: LossWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Add a data-fitting term.
    pub fn with_data(mut self, data: DataTerm) -> Self {
        self.data.push(data);
        self
    }

    /// Start from the given parameters instead of a seeded initialization.
    pub fn with_initial_parameters(mut self, params: Array) -> Self {
        self.initial_parameters = Some(params);
        self
    }

    /// Interior sampling strategy.
    pub fn strategy(&self) -> &SamplingStrategy {
        &self.strategy
    }

    /// The trial bindings.
    pub fn bindings(&self) -> &TrialBindings<A> {
        &self.bindings
    }

    /// Validate against `system` and build the training objective.
    pub fn discretize(self, system: &PdeSystem) -> Result<PinnObjective<A>> {
        let mut arguments = Vec::with_capacity(system.dependent_variables().len());
        for dv in system.dependent_variables() {
            let term = format!("dependent variable {}", dv.name);
            let expected = self
                .bindings
                .input_dim(&dv.name)
                .ok_or_else(|| Error::malformed(&term, "no trial function bound"))?;
            if expected != dv.arguments.len() {
                return Err(Error::malformed(
                    term,
                    format!(
                        "declared with {} arguments but its trial function takes {expected}",
                        dv.arguments.len()
                    ),
                ));
            }
            let axes: Vec<usize> = dv
                .arguments
                .iter()
                .filter_map(|a| system.domain().index_of(a))
                .collect();
            arguments.push((dv.name.clone(), axes));
        }

        let parameter_count = self.bindings.parameter_count();
        if let Some(p) = &self.initial_parameters {
            if p.size() != parameter_count {
                return Err(Error::InvalidArgument(format!(
                    "initial parameters have length {}, the trial functions need {parameter_count}",
                    p.size()
                )));
            }
        }
        let assembler = LossAssembler::new(self.weights)?;
        let evaluator = ResidualEvaluator::new(system.domain().clone(), self.bindings);
        let sampler = DomainSampler::new(system.domain());
        let boundary_strategy = self.boundary_strategy.unwrap_or_else(|| self.strategy.clone());
        // Stochastic batches are redrawn before every evaluation; this only
        // provides a valid batch up front.
        let mut rng = StdRng::seed_from_u64(0);

        let mut terms = Vec::new();
        for (i, eq) in system.equations().iter().enumerate() {
            let residual = evaluator.compile(&format!("equation {i}"), eq)?;
            let points = sampler.sample(&self.strategy, &mut rng)?;
            terms.push(CollocationTerm {
                residual,
                fixed: Vec::new(),
                strategy: self.strategy.clone(),
                points,
            });
        }
        for (j, bc) in system.boundary_conditions().iter().enumerate() {
            let residual = evaluator.compile(&format!("boundary condition {j}"), &bc.equation)?;
            let points = sampler.sample_subdomain(&bc.fixed, &boundary_strategy, &mut rng)?;
            terms.push(CollocationTerm {
                residual,
                fixed: bc.fixed.clone(),
                strategy: boundary_strategy.clone(),
                points,
            });
        }
        for term in &terms {
            if term.points.is_empty() {
                return Err(Error::malformed(term.residual.label(), "no sample points"));
            }
            debug!("{}: {} points", term.residual.label(), term.points.len());
        }

        let mut data = Vec::with_capacity(self.data.len());
        for (k, d) in self.data.into_iter().enumerate() {
            let label = format!("data {k}");
            let binding = evaluator
                .bindings()
                .position(&d.function)
                .ok_or_else(|| Error::malformed(&label, format!("no trial function bound to '{}'", d.function)))?;
            let dim = evaluator.bindings().input_dim(&d.function).unwrap_or(0);
            if d.inputs.is_empty() {
                return Err(Error::malformed(label, "no sample points"));
            }
            if let Some(bad) = d.inputs.iter().find(|x| x.len() != dim) {
                return Err(Error::malformed(
                    label,
                    format!("input of length {} for '{}', which takes {dim}", bad.len(), d.function),
                ));
            }
            data.push(DataFit {
                label,
                binding,
                term: d,
            });
        }

        Ok(PinnObjective {
            evaluator,
            terms,
            data,
            arguments,
            assembler,
            initial_parameters: self.initial_parameters,
        })
    }

    /// Discretize and train in one go.
    pub fn solve<P: Optimizer + ?Sized>(
        self,
        system: &PdeSystem,
        optimizer: &mut P,
        training: TrainingConfig,
    ) -> Result<PinnSolution<A>> {
        let mut objective = self.discretize(system)?;
        let initial = objective.initial_parameters(training.seed);
        let outcome = Trainer::new(training).run(&mut objective, optimizer, initial)?;
        Ok(PinnSolution {
            objective,
            parameters: outcome.parameters,
            status: outcome.status,
            loss_history: outcome.loss_history,
            result: outcome.result,
        })
    }
}

// ── Objective ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CollocationTerm {
    residual: CompiledResidual,
    fixed: Vec<(usize, Real)>,
    strategy: SamplingStrategy,
    points: Vec<Point>,
}

#[derive(Debug, Clone)]
struct DataFit {
    label: String,
    binding: usize,
    term: DataTerm,
}

/// The physics-informed training objective.
#[derive(Debug, Clone)]
pub struct PinnObjective<A> {
    evaluator: ResidualEvaluator<A>,
    terms: Vec<CollocationTerm>,
    data: Vec<DataFit>,
    arguments: Vec<(String, Vec<usize>)>,
    assembler: LossAssembler,
    initial_parameters: Option<Array>,
}

impl<A: Approximator> PinnObjective<A> {
    /// The residual evaluator.
    pub fn evaluator(&self) -> &ResidualEvaluator<A> {
        &self.evaluator
    }

    /// Term labels in loss order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .map(|t| t.residual.label())
            .chain(self.data.iter().map(|d| d.label.as_str()))
    }

    /// Current collocation points of a PDE or boundary term.
    pub fn points(&self, label: &str) -> Option<&[Point]> {
        self.terms
            .iter()
            .find(|t| t.residual.label() == label)
            .map(|t| t.points.as_slice())
    }

    /// Residual of the term `label` at every current point.
    pub fn residuals(&self, label: &str, params: &Array) -> Result<Vec<Real>> {
        let term = self
            .terms
            .iter()
            .find(|t| t.residual.label() == label)
            .ok_or_else(|| Error::InvalidArgument(format!("no term labelled '{label}'")))?;
        term.points
            .iter()
            .map(|p| self.evaluator.residual(&term.residual, params, p))
            .collect()
    }

    fn collocation_residuals(&self, term: &CollocationTerm, params: &Array) -> Result<TermResiduals> {
        let n = params.size();
        let acc = accumulate(&term.points, n, |point| {
            let tape = Tape::new();
            let theta = tape.vars(params.as_slice());
            let r = self.evaluator.evaluate_scalar(&term.residual, &theta, point)?;
            let squared = r * r;
            Ok(Some((squared.value(), tape.gradient(squared).wrt_all(&theta))))
        })?;
        Ok(TermResiduals {
            label: term.residual.label().to_string(),
            count: acc.count,
            sum_squares: acc.sum,
            gradient: Array::from_vec(acc.gradient),
        })
    }

    fn data_residuals(&self, fit: &DataFit, params: &Array) -> Result<TermResiduals> {
        let n = params.size();
        let observations: Vec<(&Point, Real)> = fit
            .term
            .inputs
            .iter()
            .zip(fit.term.targets.iter().copied())
            .collect();
        let acc = accumulate(&observations, n, |&(input, target)| {
            let tape = Tape::new();
            let theta = tape.vars(params.as_slice());
            let x: Vec<_> = input.iter().map(|&v| np_math::Var::constant(v)).collect();
            let r = self.evaluator.bindings().evaluate(fit.binding, &theta, &x)? - target;
            let squared = r * r;
            Ok(Some((squared.value(), tape.gradient(squared).wrt_all(&theta))))
        })?;
        Ok(TermResiduals {
            label: fit.label.clone(),
            count: acc.count,
            sum_squares: acc.sum,
            gradient: Array::from_vec(acc.gradient),
        })
    }
}

impl<A: Approximator> Objective for PinnObjective<A> {
    fn parameter_count(&self) -> usize {
        self.evaluator.bindings().parameter_count()
    }

    fn initial_parameters(&self, seed: u64) -> Array {
        match &self.initial_parameters {
            Some(p) => p.clone(),
            None => self.evaluator.bindings().initial_parameters(seed),
        }
    }

    /// Redraw the points of stochastic terms.
    fn prepare(&mut self, rng: &mut StdRng) -> Result<()> {
        let sampler = DomainSampler::new(self.evaluator.domain());
        for term in self.terms.iter_mut().filter(|t| t.strategy.is_random()) {
            term.points = sampler.sample_subdomain(&term.fixed, &term.strategy, rng)?;
        }
        Ok(())
    }

    fn evaluate(&self, params: &Array) -> Result<LossEvaluation> {
        let mut residuals = Vec::with_capacity(self.terms.len() + self.data.len());
        for term in &self.terms {
            residuals.push(self.collocation_residuals(term, params)?);
        }
        for fit in &self.data {
            residuals.push(self.data_residuals(fit, params)?);
        }
        self.assembler.assemble_terms(&residuals, params)
    }
}

// ── Solution ──────────────────────────────────────────────────────────────────

/// A trained physics-informed solution.
#[derive(Debug, Clone)]
pub struct PinnSolution<A> {
    objective: PinnObjective<A>,
    /// Final parameters.
    pub parameters: Array,
    /// How training ended.
    pub status: TrainingStatus,
    /// Loss per iteration.
    pub loss_history: Vec<Real>,
    /// Optimizer summary.
    pub result: OptimizationResult,
}

impl<A: Approximator> PinnSolution<A> {
    /// Value of the unknown `function` at the domain point `point`.
    pub fn u(&self, function: &str, point: &[Real]) -> Result<Real> {
        let dimension = self.objective.evaluator.domain().dimension();
        if point.len() != dimension {
            return Err(Error::InvalidArgument(format!(
                "point has {} coordinates, the domain has {dimension} axes",
                point.len()
            )));
        }
        let (_, axes) = self
            .objective
            .arguments
            .iter()
            .find(|(name, _)| name == function)
            .ok_or_else(|| Error::InvalidArgument(format!("'{function}' is not an unknown of the system")))?;
        let input: Vec<Real> = axes.iter().map(|&i| point[i]).collect();
        self.objective
            .evaluator
            .bindings()
            .evaluate_function(function, &self.parameters, &input)
    }

    /// Value of an arbitrary expression (e.g. a derivative of the solution)
    /// at `point`.
    pub fn evaluate(&self, node: &OperatorNode, point: &[Real]) -> Result<Real> {
        self.objective.evaluator.evaluate(node, &self.parameters, point)
    }

    /// Mean squared error of `function` against `exact` over `points`.
    pub fn mean_squared_error(
        &self,
        function: &str,
        points: &[Point],
        exact: impl Fn(&[Real]) -> Real,
    ) -> Result<Real> {
        if points.is_empty() {
            return Err(Error::InvalidArgument("no points to compare on".into()));
        }
        let mut sum = 0.0;
        for p in points {
            let e = self.u(function, p)? - exact(p);
            sum += e * e;
        }
        Ok(sum / points.len() as Real)
    }

    /// The objective the solution was trained on.
    pub fn objective(&self) -> &PinnObjective<A> {
        &self.objective
    }
}
