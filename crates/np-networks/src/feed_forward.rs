//! Fully connected feed-forward networks.
//!
//! Parameters are laid out layer by layer: the weight matrix of a layer in
//! row-major order (`out × in`) followed by its bias vector. Hidden layers
//! apply the configured [`Activation`]; the output layer is linear.

use crate::approximator::{check_shapes, Approximator};
use np_core::{Error, Real, Result};
use np_math::{Array, Scalar};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Hidden-layer nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// `x`
    Identity,
    /// `tanh x`
    #[default]
    Tanh,
    /// `1 / (1 + e⁻ˣ)`
    Sigmoid,
    /// `sin x`
    Sin,
}

impl Activation {
    /// Apply to a scalar.
    pub fn apply<S: Scalar>(self, x: S) -> S {
        match self {
            Self::Identity => x,
            Self::Tanh => x.tanh(),
            Self::Sigmoid => x.sigmoid(),
            Self::Sin => x.sin(),
        }
    }
}

/// A multilayer perceptron.
///
/// ```
/// use np_networks::{Activation, Approximator, FeedForwardNetwork};
///
/// let net = FeedForwardNetwork::new(&[2, 8, 1], Activation::Tanh).unwrap();
/// assert_eq!(net.parameter_count(), 2 * 8 + 8 + 8 + 1);
/// let theta = net.initial_parameters(7);
/// let y = net.evaluate(&theta, &[0.1, 0.2]).unwrap();
/// assert_eq!(y.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardNetwork {
    layers: Vec<usize>,
    activation: Activation,
    parameter_count: usize,
}

impl FeedForwardNetwork {
    /// A network with the given layer widths, input first, output last.
    pub fn new(layers: &[usize], activation: Activation) -> Result<Self> {
        if layers.len() < 2 {
            return Err(Error::InvalidArgument(
                "a network needs at least an input and an output layer".into(),
            ));
        }
        if let Some(pos) = layers.iter().position(|&w| w == 0) {
            return Err(Error::InvalidArgument(format!("layer {pos} has zero width")));
        }
        let parameter_count = layers.windows(2).map(|w| w[1] * (w[0] + 1)).sum();
        Ok(Self {
            layers: layers.to_vec(),
            activation,
            parameter_count,
        })
    }

    /// Layer widths.
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Hidden-layer activation.
    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Approximator for FeedForwardNetwork {
    fn input_dim(&self) -> usize {
        self.layers[0]
    }

    fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }

    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Glorot-normal weights, zero biases.
    fn initial_parameters(&self, seed: u64) -> Array {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut theta = Vec::with_capacity(self.parameter_count);
        for w in self.layers.windows(2) {
            let (fan_in, fan_out) = (w[0], w[1]);
            let std_dev = (2.0 / (fan_in + fan_out) as Real).sqrt();
            match Normal::new(0.0, std_dev) {
                Ok(normal) => theta.extend((0..fan_in * fan_out).map(|_| normal.sample(&mut rng))),
                Err(_) => theta.extend(std::iter::repeat(0.0).take(fan_in * fan_out)),
            }
            theta.extend(std::iter::repeat(0.0).take(fan_out));
        }
        Array::from_vec(theta)
    }

    fn apply<S: Scalar>(&self, params: &[S], input: &[S]) -> Result<Vec<S>> {
        check_shapes(self, params.len(), input.len())?;
        let last = self.layers.len() - 2;
        let mut activations = input.to_vec();
        let mut offset = 0;
        for (l, w) in self.layers.windows(2).enumerate() {
            let (fan_in, fan_out) = (w[0], w[1]);
            let weights = &params[offset..offset + fan_in * fan_out];
            let biases = &params[offset + fan_in * fan_out..offset + fan_out * (fan_in + 1)];
            offset += fan_out * (fan_in + 1);

            let mut next = Vec::with_capacity(fan_out);
            for (row, &b) in weights.chunks_exact(fan_in).zip(biases) {
                let z = row
                    .iter()
                    .zip(&activations)
                    .fold(b, |acc, (&wij, &aj)| acc + wij * aj);
                next.push(if l == last { z } else { self.activation.apply(z) });
            }
            activations = next;
        }
        Ok(activations)
    }
}
