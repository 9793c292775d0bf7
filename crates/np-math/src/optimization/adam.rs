use super::{check_dimensions, Optimizer};
use crate::array::Array;
use np_core::{ensure, Real, Result};

/// Adam (Kingma & Ba, 2015) with bias-corrected moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: Real,
    beta1: Real,
    beta2: Real,
    epsilon: Real,
    first_moment: Option<Array>,
    second_moment: Option<Array>,
    step_count: i32,
}

impl Adam {
    /// Adam with step size `learning_rate` and the usual defaults
    /// `β₁ = 0.9`, `β₂ = 0.999`, `ε = 1e-8`.
    pub fn new(learning_rate: Real) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            first_moment: None,
            second_moment: None,
            step_count: 0,
        }
    }

    /// Override the moment decay rates.
    pub fn with_betas(mut self, beta1: Real, beta2: Real) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "Adam"
    }

    fn step(&mut self, parameters: &Array, gradient: &Array) -> Result<Array> {
        check_dimensions(parameters, gradient)?;
        ensure!(
            (0.0..1.0).contains(&self.beta1) && (0.0..1.0).contains(&self.beta2),
            "Adam decay rates must lie in [0, 1), got ({}, {})",
            self.beta1,
            self.beta2
        );
        let n = parameters.size();
        let m = self.first_moment.get_or_insert_with(|| Array::zeros(n));
        let v = self.second_moment.get_or_insert_with(|| Array::zeros(n));
        self.step_count += 1;

        let c1 = 1.0 - self.beta1.powi(self.step_count);
        let c2 = 1.0 - self.beta2.powi(self.step_count);
        let mut updated = parameters.clone();
        for i in 0..n {
            let g = gradient[i];
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = m[i] / c1;
            let v_hat = v[i] / c2;
            updated[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
        Ok(updated)
    }

    fn reset(&mut self) {
        self.first_moment = None;
        self.second_moment = None;
        self.step_count = 0;
    }
}
