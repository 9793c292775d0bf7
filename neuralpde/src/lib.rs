//! # neuralpde
//!
//! Neural-network solvers for partial differential equations: physics-informed
//! neural networks (PINNs) for general PDE systems on box domains, and the
//! deep BSDE method for high-dimensional semilinear parabolic problems.
//!
//! This crate is a **façade** that re-exports the underlying workspace crates.
//! Application code should depend on this crate rather than the individual
//! `np-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use neuralpde::methods::{PhysicsInformedNN, SamplingStrategy, TrainingConfig};
//! use neuralpde::math::Adam;
//! use neuralpde::networks::{Activation, FeedForwardNetwork, TrialBindings};
//! use neuralpde::symbolic::{
//!     BoundaryCondition, DependentVariable, Domain, DomainAxis, Equation, OperatorNode, PdeSystem,
//! };
//!
//! // u'' = 2 on [0, 1], u(0) = u(1) = 0
//! let x = OperatorNode::variable("x");
//! let u = |arg: OperatorNode| OperatorNode::apply("u", vec![arg]);
//! let system = PdeSystem::new(
//!     vec![Equation::new(OperatorNode::derivative(u(x), "x", 2).unwrap(), 2.0)],
//!     vec![
//!         BoundaryCondition::new(u(0.0.into()), 0.0),
//!         BoundaryCondition::new(u(1.0.into()), 0.0),
//!     ],
//!     Domain::new(vec![DomainAxis::new("x", 0.0, 1.0).unwrap()]).unwrap(),
//!     vec![DependentVariable::new("u", ["x"])],
//! )
//! .unwrap();
//!
//! let net = FeedForwardNetwork::new(&[1, 8, 1], Activation::Tanh).unwrap();
//! let solution = PhysicsInformedNN::new(TrialBindings::shared(net, &["u"]).unwrap())
//!     .with_strategy(SamplingStrategy::grid(0.1))
//!     .solve(&system, &mut Adam::new(0.01), TrainingConfig::default().with_max_iterations(20))
//!     .unwrap();
//! assert_eq!(solution.loss_history.len(), 20);
//! let _ = solution.u("u", &[0.5]).unwrap();
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use np_core as core;

/// Arrays, automatic differentiation, random numbers, and optimizers.
pub use np_math as math;

/// Operator trees, domains, and PDE systems.
pub use np_symbolic as symbolic;

/// Differentiable approximators and trial-function bindings.
pub use np_networks as networks;

/// Stochastic processes, time grids, and SDE schemes.
pub use np_processes as processes;

/// Sampling, residuals, loss assembly, training, PINN and deep BSDE solvers.
pub use np_methods as methods;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// The types most programs need.
pub mod prelude {
    pub use np_core::{Error, Real, Result};
    pub use np_math::{Adam, Array, EndCriteria, GradientDescent, Optimizer};
    pub use np_methods::{
        DeepBsde, DeepBsdeConfig, LossWeights, PhysicsInformedNN, SamplingStrategy,
        TerminalProblem, TrainingConfig, TrainingStatus,
    };
    pub use np_networks::{Activation, Approximator, FeedForwardNetwork, TrialBindings};
    pub use np_symbolic::{
        BoundaryCondition, DependentVariable, Domain, DomainAxis, Equation, Face, OperatorNode,
        PdeSystem,
    };
}
