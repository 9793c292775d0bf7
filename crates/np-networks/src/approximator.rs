//! The approximator interface.

use np_core::{Error, Real, Result};
use np_math::{Array, Scalar, Tape, Var};

/// A parametric, differentiable function `ℝⁿ → ℝᵐ`.
///
/// [`apply`](Approximator::apply) is generic over the scalar type: calling it
/// with `f64` evaluates, with [`Var`] records on a tape for parameter
/// gradients, and with [`np_math::Jet`] yields exact input derivatives.
pub trait Approximator: Send + Sync {
    /// Input dimension `n`.
    fn input_dim(&self) -> usize;

    /// Output dimension `m`.
    fn output_dim(&self) -> usize;

    /// Length of the flat parameter vector.
    fn parameter_count(&self) -> usize;

    /// A reproducible initial parameter vector.
    fn initial_parameters(&self, seed: u64) -> Array;

    /// Evaluate the function at `input` with parameters `params`.
    fn apply<S: Scalar>(&self, params: &[S], input: &[S]) -> Result<Vec<S>>;

    /// Plain evaluation.
    fn evaluate(&self, params: &Array, input: &[Real]) -> Result<Vec<Real>> {
        self.apply(params.as_slice(), input)
    }

    /// Vector-Jacobian product `sensitivityᵀ · ∂f/∂θ` by reverse mode.
    fn gradient(&self, params: &Array, input: &[Real], sensitivity: &[Real]) -> Result<Array> {
        if sensitivity.len() != self.output_dim() {
            return Err(Error::InvalidArgument(format!(
                "sensitivity has {} entries but the approximator has {} outputs",
                sensitivity.len(),
                self.output_dim()
            )));
        }
        let tape = Tape::with_capacity(4 * self.parameter_count());
        let theta = tape.vars(params.as_slice());
        let x: Vec<Var<'_>> = input.iter().map(|&v| Var::constant(v)).collect();
        let outputs = self.apply(&theta, &x)?;
        let weighted = outputs
            .into_iter()
            .zip(sensitivity)
            .fold(Var::constant(0.0), |acc, (y, &s)| acc + y * s);
        Ok(Array::from_vec(tape.gradient(weighted).wrt_all(&theta)))
    }
}

/// Length checks shared by implementations of [`Approximator::apply`].
pub(crate) fn check_shapes<A: Approximator + ?Sized>(
    approximator: &A,
    params: usize,
    input: usize,
) -> Result<()> {
    if params != approximator.parameter_count() {
        return Err(Error::InvalidArgument(format!(
            "expected {} parameters, got {params}",
            approximator.parameter_count()
        )));
    }
    if input != approximator.input_dim() {
        return Err(Error::InvalidArgument(format!(
            "expected input of dimension {}, got {input}",
            approximator.input_dim()
        )));
    }
    Ok(())
}
