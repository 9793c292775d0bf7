//! Loss assembly.
//!
//! Every term (a PDE equation, a boundary condition or a data set) contributes
//! the mean of its squared residuals, multiplied by the term's weight. An
//! optional L2 penalty `λ‖θ‖²` is added on top.

use crate::training::LossEvaluation;
use np_core::{Error, Real, Result};
use np_math::Array;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-term loss weights.
///
/// ```
/// use np_methods::LossWeights;
///
/// let w = LossWeights::default().with_weight("boundary condition 0", 10.0);
/// assert_eq!(w.weight("equation 0"), 1.0);
/// assert_eq!(w.weight("boundary condition 0"), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// Weight of every term without an override.
    pub default: Real,
    /// Weights keyed by term label.
    #[serde(default)]
    pub overrides: BTreeMap<String, Real>,
    /// Coefficient `λ` of the `λ‖θ‖²` penalty.
    #[serde(default)]
    pub l2_regularization: Real,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            default: 1.0,
            overrides: BTreeMap::new(),
            l2_regularization: 0.0,
        }
    }
}

impl LossWeights {
    /// Change the default weight.
    pub fn with_default(mut self, weight: Real) -> Self {
        self.default = weight;
        self
    }

    /// Override the weight of the term labelled `term`.
    pub fn with_weight(mut self, term: impl Into<String>, weight: Real) -> Self {
        self.overrides.insert(term.into(), weight);
        self
    }

    /// Set the L2 regularization coefficient.
    pub fn with_l2_regularization(mut self, lambda: Real) -> Self {
        self.l2_regularization = lambda;
        self
    }

    /// The weight applied to `term`.
    pub fn weight(&self, term: &str) -> Real {
        self.overrides.get(term).copied().unwrap_or(self.default)
    }

    fn validate(&self) -> Result<()> {
        let all = std::iter::once(("default", self.default))
            .chain(self.overrides.iter().map(|(k, v)| (k.as_str(), *v)));
        for (term, w) in all {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidArgument(format!(
                    "weight of {term} must be finite and non-negative, got {w}"
                )));
            }
        }
        if !self.l2_regularization.is_finite() || self.l2_regularization < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "L2 regularization must be finite and non-negative, got {}",
                self.l2_regularization
            )));
        }
        Ok(())
    }
}

/// Sum of squared residuals of one term over its points, together with the
/// gradient of that sum with respect to the parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TermResiduals {
    /// Term label.
    pub label: String,
    /// Number of points the term was evaluated on.
    pub count: usize,
    /// `Σ r²`.
    pub sum_squares: Real,
    /// `∇θ Σ r²`.
    pub gradient: Array,
}

/// Combines per-term residuals into the training loss.
#[derive(Debug, Clone, Default)]
pub struct LossAssembler {
    weights: LossWeights,
}

impl LossAssembler {
    /// An assembler with the given weights.
    pub fn new(weights: LossWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// The weights in use.
    pub fn weights(&self) -> &LossWeights {
        &self.weights
    }

    /// Weighted sum of mean squared residuals, one slice per term.
    pub fn assemble(&self, terms: &[(&str, &[Real])]) -> Result<Real> {
        let mut loss = 0.0;
        for (label, residuals) in terms {
            if residuals.is_empty() {
                return Err(Error::malformed(*label, "no sample points"));
            }
            let sum_squares: Real = residuals.iter().map(|r| r * r).sum();
            loss += self.weights.weight(label) * sum_squares / residuals.len() as Real;
        }
        Ok(loss)
    }

    /// Loss and gradient from accumulated term residuals, including the L2
    /// penalty on `params`.
    pub fn assemble_terms(&self, terms: &[TermResiduals], params: &Array) -> Result<LossEvaluation> {
        let mut loss = 0.0;
        let mut gradient = Array::zeros(params.size());
        let mut breakdown = Vec::with_capacity(terms.len());
        for term in terms {
            if term.count == 0 {
                return Err(Error::malformed(&term.label, "no sample points"));
            }
            if term.gradient.size() != params.size() {
                return Err(Error::InvalidArgument(format!(
                    "{} has a gradient of length {}, expected {}",
                    term.label,
                    term.gradient.size(),
                    params.size()
                )));
            }
            let mean = term.sum_squares / term.count as Real;
            let scale = self.weights.weight(&term.label) / term.count as Real;
            loss += self.weights.weight(&term.label) * mean;
            gradient.axpy(scale, &term.gradient);
            breakdown.push((term.label.clone(), mean));
        }
        let lambda = self.weights.l2_regularization;
        if lambda > 0.0 {
            loss += lambda * params.norm_squared();
            gradient.axpy(2.0 * lambda, params);
        }
        Ok(LossEvaluation {
            loss,
            gradient,
            terms: breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_residuals_with_weight_two() {
        let assembler = LossAssembler::new(LossWeights::default().with_default(2.0)).unwrap();
        let loss = assembler.assemble(&[("equation 0", &[1.0, 1.0, 1.0][..])]).unwrap();
        assert_relative_eq!(loss, 2.0, epsilon = 1e-15);
    }

    #[test]
    fn per_term_overrides() {
        let weights = LossWeights::default().with_weight("boundary condition 0", 3.0);
        let assembler = LossAssembler::new(weights).unwrap();
        let loss = assembler
            .assemble(&[
                ("equation 0", &[2.0, 0.0][..]),
                ("boundary condition 0", &[1.0][..]),
            ])
            .unwrap();
        assert_relative_eq!(loss, 2.0 + 3.0, epsilon = 1e-15);
    }

    #[test]
    fn empty_term_is_malformed() {
        let err = LossAssembler::default()
            .assemble(&[("equation 0", &[1.0][..]), ("boundary condition 1", &[] as &[Real])])
            .unwrap_err();
        assert_eq!(err, Error::malformed("boundary condition 1", "no sample points"));
    }

    #[test]
    fn gradient_follows_weights_and_penalty() {
        let weights = LossWeights::default()
            .with_weight("data u", 0.5)
            .with_l2_regularization(0.1);
        let assembler = LossAssembler::new(weights).unwrap();
        let params = Array::from_slice(&[1.0, -2.0]);
        let terms = vec![
            TermResiduals {
                label: "equation 0".into(),
                count: 4,
                sum_squares: 8.0,
                gradient: Array::from_slice(&[4.0, 0.0]),
            },
            TermResiduals {
                label: "data u".into(),
                count: 2,
                sum_squares: 2.0,
                gradient: Array::from_slice(&[0.0, 2.0]),
            },
        ];
        let eval = assembler.assemble_terms(&terms, &params).unwrap();
        // 8/4 + 0.5·2/2 + 0.1·5
        assert_relative_eq!(eval.loss, 2.0 + 0.5 + 0.5, epsilon = 1e-14);
        assert_relative_eq!(eval.gradient[0], 1.0 + 0.2, epsilon = 1e-14);
        assert_relative_eq!(eval.gradient[1], 0.5 - 0.4, epsilon = 1e-14);
        assert_eq!(eval.terms[1], ("data u".to_string(), 1.0));
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(LossAssembler::new(LossWeights::default().with_default(-1.0)).is_err());
        assert!(LossAssembler::new(LossWeights::default().with_l2_regularization(Real::NAN)).is_err());
    }

    #[test]
    fn weights_deserialize_with_defaults() {
        let w: LossWeights = serde_json::from_str(r#"{ "default": 1.0 }"#).unwrap();
        assert_eq!(w, LossWeights::default());
    }
}
