//! # np-methods
//!
//! The discretization engine and the solvers built on it.
//!
//! * [`sampling`] — collocation points over box domains and their faces
//! * [`residual`] — operator trees compiled into differentiable residuals
//! * [`loss`] — weighted mean-squared loss assembly
//! * [`discretization`] — physics-informed neural networks (PINNs)
//! * [`training`] — the training loop state machine
//! * [`monte_carlo`] — trajectory simulation
//! * [`bsde`] — the deep BSDE solver for parabolic PDEs

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

pub mod bsde;
pub mod discretization;
pub mod loss;
pub mod monte_carlo;
mod parallel;
pub mod residual;
pub mod sampling;
pub mod training;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use bsde::{
    BsdeObjective, BsdeSolution, DeepBsde, DeepBsdeConfig, DiscountRunningCost, RunningCost,
    TerminalProblem, TrajectoryState, ZeroRunningCost,
};
pub use discretization::{DataTerm, PhysicsInformedNN, PinnObjective, PinnSolution};
pub use loss::{LossAssembler, LossWeights, TermResiduals};
pub use monte_carlo::{Trajectory, TrajectoryGenerator};
pub use residual::{CompiledResidual, ResidualEvaluator};
pub use sampling::{DomainSampler, SamplingStrategy};
pub use training::{
    LossEvaluation, Objective, Trainer, TrainingConfig, TrainingContext, TrainingOutcome,
    TrainingState, TrainingStatus,
};
