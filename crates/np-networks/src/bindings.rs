//! Binding unknown functions to approximator outputs.

use crate::approximator::Approximator;
use np_core::{Error, Real, Result};
use np_math::{Array, Scalar};

/// Where an unknown function is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    function: String,
    approximator: usize,
    output: usize,
}

/// Trial functions for the unknowns of a PDE system.
///
/// Each unknown maps to one output of one approximator. The parameters of
/// all approximators form one flat vector, approximator `k` owning the
/// segment starting at `offset(k)`.
#[derive(Debug, Clone)]
pub struct TrialBindings<A> {
    approximators: Vec<A>,
    offsets: Vec<usize>,
    bindings: Vec<Binding>,
}

impl<A: Approximator> TrialBindings<A> {
    /// Approximators without any bound function; see [`bind`](Self::bind).
    pub fn new(approximators: Vec<A>) -> Self {
        let mut offsets = Vec::with_capacity(approximators.len());
        let mut total = 0;
        for a in &approximators {
            offsets.push(total);
            total += a.parameter_count();
        }
        Self {
            approximators,
            offsets,
            bindings: Vec::new(),
        }
    }

    /// One approximator serving every function, output `i` for `functions[i]`.
    pub fn shared(approximator: A, functions: &[&str]) -> Result<Self> {
        let mut b = Self::new(vec![approximator]);
        for (i, f) in functions.iter().enumerate() {
            b = b.bind(*f, 0, i)?;
        }
        Ok(b)
    }

    /// One approximator per function, each read from its first output.
    pub fn separate(pairs: Vec<(&str, A)>) -> Result<Self> {
        let (names, approximators): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let mut b = Self::new(approximators);
        for (k, f) in names.into_iter().enumerate() {
            b = b.bind(f, k, 0)?;
        }
        Ok(b)
    }

    /// Read `function` from `output` of approximator `approximator`.
    pub fn bind(mut self, function: impl Into<String>, approximator: usize, output: usize) -> Result<Self> {
        let function = function.into();
        let a = self.approximators.get(approximator).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "no approximator {approximator} for '{function}' ({} available)",
                self.approximators.len()
            ))
        })?;
        if output >= a.output_dim() {
            return Err(Error::InvalidArgument(format!(
                "approximator {approximator} has {} outputs, cannot bind '{function}' to output {output}",
                a.output_dim()
            )));
        }
        if self.bindings.iter().any(|b| b.function == function) {
            return Err(Error::InvalidArgument(format!("'{function}' is bound twice")));
        }
        self.bindings.push(Binding {
            function,
            approximator,
            output,
        });
        Ok(self)
    }

    /// The approximators, in parameter order.
    pub fn approximators(&self) -> &[A] {
        &self.approximators
    }

    /// Index of the binding for `function`, usable with
    /// [`evaluate`](Self::evaluate).
    pub fn position(&self, function: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.function == function)
    }

    /// `(approximator, output)` for `function`.
    pub fn binding(&self, function: &str) -> Option<(usize, usize)> {
        self.bindings
            .iter()
            .find(|b| b.function == function)
            .map(|b| (b.approximator, b.output))
    }

    /// Names of the bound functions.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.function.as_str())
    }

    /// Input dimension expected by `function`.
    pub fn input_dim(&self, function: &str) -> Option<usize> {
        self.binding(function)
            .map(|(a, _)| self.approximators[a].input_dim())
    }

    /// Total length of the flat parameter vector.
    pub fn parameter_count(&self) -> usize {
        self.approximators.iter().map(A::parameter_count).sum()
    }

    /// Concatenated initial parameters; approximator `k` is seeded with
    /// `seed + k`.
    pub fn initial_parameters(&self, seed: u64) -> Array {
        let parts: Vec<Array> = self
            .approximators
            .iter()
            .enumerate()
            .map(|(k, a)| a.initial_parameters(seed.wrapping_add(k as u64)))
            .collect();
        Array::concat(&parts.iter().collect::<Vec<_>>())
    }

    /// The segment of `params` owned by approximator `k`.
    pub fn parameters_of<'p, S>(&self, params: &'p [S], k: usize) -> &'p [S] {
        let start = self.offsets[k];
        &params[start..start + self.approximators[k].parameter_count()]
    }

    /// Value of the bound function at `binding` (see
    /// [`position`](Self::position)) for the given input.
    pub fn evaluate<S: Scalar>(&self, binding: usize, params: &[S], input: &[S]) -> Result<S> {
        if params.len() != self.parameter_count() {
            return Err(Error::InvalidArgument(format!(
                "expected {} parameters, got {}",
                self.parameter_count(),
                params.len()
            )));
        }
        let b = self.bindings.get(binding).ok_or_else(|| {
            Error::InvalidArgument(format!("no trial function binding {binding}"))
        })?;
        let outputs = self.approximators[b.approximator]
            .apply(self.parameters_of(params, b.approximator), input)?;
        Ok(outputs[b.output])
    }

    /// Plain evaluation of `function`.
    pub fn evaluate_function(&self, function: &str, params: &Array, input: &[Real]) -> Result<Real> {
        let binding = self
            .position(function)
            .ok_or_else(|| Error::InvalidArgument(format!("'{function}' is not bound")))?;
        self.evaluate(binding, params.as_slice(), input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_forward::{Activation, FeedForwardNetwork};

    fn net(outputs: usize) -> FeedForwardNetwork {
        FeedForwardNetwork::new(&[2, 4, outputs], Activation::Tanh).unwrap()
    }

    #[test]
    fn shared_network_reads_distinct_outputs() {
        let b = TrialBindings::shared(net(2), &["u", "v"]).unwrap();
        assert_eq!(b.binding("v"), Some((0, 1)));
        let theta = b.initial_parameters(1);
        let direct = b.approximators()[0].evaluate(&theta, &[0.1, 0.2]).unwrap();
        assert_eq!(b.evaluate_function("u", &theta, &[0.1, 0.2]).unwrap(), direct[0]);
        assert_eq!(b.evaluate_function("v", &theta, &[0.1, 0.2]).unwrap(), direct[1]);
    }

    #[test]
    fn separate_networks_concatenate_parameters() {
        let b = TrialBindings::separate(vec![("u", net(1)), ("v", net(1))]).unwrap();
        let per_net = net(1).parameter_count();
        assert_eq!(b.parameter_count(), 2 * per_net);
        let theta = b.initial_parameters(4);
        assert_eq!(theta.size(), 2 * per_net);

        let second = Array::from_slice(b.parameters_of(theta.as_slice(), 1));
        assert_eq!(second, net(1).initial_parameters(5));
        let v = b.evaluate_function("v", &theta, &[0.3, 0.0]).unwrap();
        assert_eq!(v, net(1).evaluate(&second, &[0.3, 0.0]).unwrap()[0]);
    }

    #[test]
    fn invalid_bindings() {
        assert!(TrialBindings::shared(net(1), &["u", "v"]).is_err());
        assert!(TrialBindings::new(vec![net(1)]).bind("u", 1, 0).is_err());
        let b = TrialBindings::new(vec![net(2)]).bind("u", 0, 0).unwrap();
        assert!(b.bind("u", 0, 1).is_err());
    }
}
