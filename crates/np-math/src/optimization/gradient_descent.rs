use super::{check_dimensions, Optimizer};
use crate::array::Array;
use np_core::{ensure, Real, Result};

/// Steepest descent with optional heavy-ball momentum.
///
/// `v ← μ v − η g`, `θ ← θ + v`.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: Real,
    momentum: Real,
    velocity: Option<Array>,
}

impl GradientDescent {
    /// Plain gradient descent with step size `learning_rate`.
    pub fn new(learning_rate: Real) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: None,
        }
    }

    /// Enable momentum with coefficient `momentum ∈ [0, 1)`.
    pub fn with_momentum(mut self, momentum: Real) -> Self {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for GradientDescent {
    fn name(&self) -> &'static str {
        "GradientDescent"
    }

    fn step(&mut self, parameters: &Array, gradient: &Array) -> Result<Array> {
        check_dimensions(parameters, gradient)?;
        ensure!(
            self.learning_rate > 0.0,
            "learning rate must be positive, got {}",
            self.learning_rate
        );
        let velocity = self
            .velocity
            .get_or_insert_with(|| Array::zeros(parameters.size()));
        *velocity = velocity.scale(self.momentum);
        velocity.axpy(-self.learning_rate, gradient);
        Ok(parameters + &*velocity)
    }

    fn reset(&mut self) {
        self.velocity = None;
    }
}
