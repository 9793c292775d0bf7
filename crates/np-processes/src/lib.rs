//! # np-processes
//!
//! Stochastic differential equations `dX = μ(t,X) dt + σ(t,X) dW` used by the
//! deep BSDE solver: the process traits, a few concrete processes, the time
//! grid a trajectory is simulated on, and the discretization schemes.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod brownian_motion;
pub mod functional_process;
pub mod geometric_brownian_motion;
pub mod ornstein_uhlenbeck_process;
pub mod scheme;
pub mod stochastic_process;
pub mod time_grid;

pub use brownian_motion::ScaledBrownianMotion;
pub use functional_process::FunctionalProcess;
pub use geometric_brownian_motion::GeometricBrownianMotionProcess;
pub use ornstein_uhlenbeck_process::OrnsteinUhlenbeckProcess;
pub use scheme::SdeScheme;
pub use stochastic_process::{StochasticProcess, StochasticProcess1D};
pub use time_grid::TimeGrid;
