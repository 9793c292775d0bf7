//! End-to-end tests of the physics-informed discretization.
//!
//! These build complete PDE systems, discretize them and train small
//! networks, checking the training loop's terminal states along the way.

use approx::assert_relative_eq;
use np_core::Error;
use np_math::{Adam, GradientDescent};
use np_methods::{
    LossWeights, Objective, PhysicsInformedNN, SamplingStrategy, TrainingConfig, TrainingStatus,
};
use np_networks::{Activation, Approximator, FeedForwardNetwork, TrialBindings};
use np_symbolic::{BoundaryCondition, DependentVariable, Domain, DomainAxis, Equation, OperatorNode, PdeSystem};
use std::f64::consts::PI;

fn u(arg: OperatorNode) -> OperatorNode {
    OperatorNode::apply("u", vec![arg])
}

/// `u'' = −π² sin(πx)` on `[0, 1]` with `u(0) = u(1) = 0`; exact `sin(πx)`.
fn poisson_1d() -> PdeSystem {
    let x = OperatorNode::variable("x");
    let uxx = OperatorNode::derivative(u(x.clone()), "x", 2).unwrap();
    PdeSystem::new(
        vec![Equation::new(uxx, -PI * PI * (PI * x).sin())],
        vec![
            BoundaryCondition::new(u(0.0.into()), 0.0),
            BoundaryCondition::new(u(1.0.into()), 0.0),
        ],
        Domain::new(vec![DomainAxis::new("x", 0.0, 1.0).unwrap()]).unwrap(),
        vec![DependentVariable::new("u", ["x"])],
    )
    .unwrap()
}

fn network() -> FeedForwardNetwork {
    FeedForwardNetwork::new(&[1, 16, 1], Activation::Tanh).unwrap()
}

fn pinn() -> PhysicsInformedNN<FeedForwardNetwork> {
    PhysicsInformedNN::new(TrialBindings::shared(network(), &["u"]).unwrap())
}

// ─── Poisson ──────────────────────────────────────────────────────────────────

#[test]
fn poisson_1d_smoke() {
    let training = TrainingConfig::default()
        .with_max_iterations(4000)
        .with_abstol(1e-6)
        .with_seed(17);
    let solution = pinn()
        .with_strategy(SamplingStrategy::grid(0.1))
        .solve(&poisson_1d(), &mut Adam::new(0.01), training)
        .unwrap();
    assert!(solution.status.error().is_none(), "{:?}", solution.status);

    // Held-out midpoints of the training grid.
    let held_out: Vec<Vec<f64>> = (0..20).map(|i| vec![0.025 + 0.05 * i as f64]).collect();
    let mse = solution
        .mean_squared_error("u", &held_out, |p| (PI * p[0]).sin())
        .unwrap();
    assert!(mse < 1e-2, "mse = {mse}");

    let history = &solution.loss_history;
    assert!(history.last().unwrap() < &history[0]);
}

// ─── Training loop states ─────────────────────────────────────────────────────

#[test]
fn zero_iterations_leaves_parameters_unchanged() {
    let config = TrainingConfig::default().with_max_iterations(0).with_seed(3);
    let expected = network().initial_parameters(3);
    let solution = pinn()
        .solve(&poisson_1d(), &mut Adam::new(0.01), config)
        .unwrap();
    assert_eq!(solution.status, TrainingStatus::Exhausted);
    assert_eq!(solution.parameters, expected);
    assert!(solution.loss_history.is_empty());
    assert_eq!(solution.result.iterations, 0);
}

#[test]
fn seeded_stochastic_runs_have_identical_histories() {
    let run = || {
        let config = TrainingConfig::default().with_max_iterations(25).with_seed(99);
        pinn()
            .with_strategy(SamplingStrategy::stochastic(64))
            .solve(&poisson_1d(), &mut Adam::new(0.01), config)
            .unwrap()
            .loss_history
    };
    let first = run();
    assert_eq!(first.len(), 25);
    assert_eq!(first, run());
}

#[test]
fn quasi_random_sampling_trains() {
    let config = TrainingConfig::default().with_max_iterations(50);
    let solution = pinn()
        .with_strategy(SamplingStrategy::quasi_random(32))
        .solve(&poisson_1d(), &mut Adam::new(0.01), config)
        .unwrap();
    assert_eq!(solution.status, TrainingStatus::Exhausted);
    assert!(solution.loss_history.last().unwrap() < &solution.loss_history[0]);
}

#[test]
fn exploding_step_fails_with_divergence() {
    let config = TrainingConfig::default().with_max_iterations(10_000);
    let solution = pinn()
        .with_weights(LossWeights::default().with_l2_regularization(1.0))
        .solve(&poisson_1d(), &mut GradientDescent::new(10.0), config)
        .unwrap();
    match &solution.status {
        TrainingStatus::Failed(Error::NumericalDivergence { last_finite_loss, .. }) => {
            assert_eq!(*last_finite_loss, solution.loss_history.last().copied());
        }
        other => panic!("unexpected status {other:?}"),
    }
}

// ─── Structural errors ────────────────────────────────────────────────────────

#[test]
fn derivative_order_beyond_four_is_unsupported() {
    let x = OperatorNode::variable("x");
    let u5 = OperatorNode::derivative(u(x), "x", 5).unwrap();
    let system = PdeSystem::new(
        vec![Equation::new(u5, 0.0)],
        vec![],
        Domain::new(vec![DomainAxis::new("x", 0.0, 1.0).unwrap()]).unwrap(),
        vec![DependentVariable::new("u", ["x"])],
    )
    .unwrap();
    let err = pinn().discretize(&system).unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperator(_)), "{err}");
}

#[test]
fn two_dimensional_laplace_with_shared_network() {
    // Δu = 0 on the unit square with u = x on the boundary; exact u = x.
    let x = OperatorNode::variable("x");
    let y = OperatorNode::variable("y");
    let uf = |a: OperatorNode, b: OperatorNode| OperatorNode::apply("u", vec![a, b]);
    let lap = OperatorNode::derivative(uf(x.clone(), y.clone()), "x", 2).unwrap()
        + OperatorNode::derivative(uf(x.clone(), y.clone()), "y", 2).unwrap();
    let system = PdeSystem::new(
        vec![Equation::new(lap, 0.0)],
        vec![
            BoundaryCondition::new(uf(0.0.into(), y.clone()), 0.0),
            BoundaryCondition::new(uf(1.0.into(), y.clone()), 1.0),
            BoundaryCondition::new(uf(x.clone(), 0.0.into()), x.clone()),
            BoundaryCondition::new(uf(x.clone(), 1.0.into()), x),
        ],
        Domain::new(vec![
            DomainAxis::new("x", 0.0, 1.0).unwrap(),
            DomainAxis::new("y", 0.0, 1.0).unwrap(),
        ])
        .unwrap(),
        vec![DependentVariable::new("u", ["x", "y"])],
    )
    .unwrap();

    let net = FeedForwardNetwork::new(&[2, 8, 1], Activation::Tanh).unwrap();
    let objective = PhysicsInformedNN::new(TrialBindings::shared(net, &["u"]).unwrap())
        .with_strategy(SamplingStrategy::grid(0.25))
        .discretize(&system)
        .unwrap();
    assert_eq!(objective.points("equation 0").unwrap().len(), 25);
    assert_eq!(objective.points("boundary condition 2").unwrap().len(), 5);
    let theta = objective.initial_parameters(0);
    let eval = objective.evaluate(&theta).unwrap();
    assert_eq!(eval.terms.len(), 5);
    let sum: f64 = eval.terms.iter().map(|(_, mse)| mse).sum();
    assert_relative_eq!(eval.loss, sum, epsilon = 1e-12);
}
