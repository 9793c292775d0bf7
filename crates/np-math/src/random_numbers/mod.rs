//! Random number generators.
//!
//! Wrappers around `rand_mt` (Mersenne Twister) and `statrs` (inverse normal
//! CDF) used for Brownian increments, plus the Sobol low-discrepancy
//! sequence used for quasi-random collocation.

mod sobol;

pub use sobol::{SobolRsg, MAX_DIMENSION};

use np_core::Real;
use rand_mt::Mt19937GenRand64;
use statrs::distribution::{ContinuousCDF, Normal};

/// A uniform pseudo-random number generator based on the Mersenne Twister
/// MT19937-64 algorithm.
pub struct MersenneTwisterUniformRng {
    rng: Mt19937GenRand64,
}

impl MersenneTwisterUniformRng {
    /// Create a new generator with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mt19937GenRand64::new(seed),
        }
    }

    /// Generate the next uniform deviate in `[0, 1)`.
    pub fn next_real(&mut self) -> Real {
        // 53 random bits → [0, 1)
        (self.rng.next_u64() >> 11) as Real / (1u64 << 53) as Real
    }
}

/// Standard normal deviates by inversion of a Mersenne Twister stream.
pub struct InverseCumulativeNormalRng {
    inner: MersenneTwisterUniformRng,
    normal: Normal,
}

impl InverseCumulativeNormalRng {
    /// Create a new generator backed by a Mersenne Twister with the given
    /// seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: MersenneTwisterUniformRng::new(seed),
            normal: Normal::standard(),
        }
    }

    /// Generate the next standard-normal deviate.
    pub fn next_real(&mut self) -> Real {
        // Avoid exact 0 which would produce -∞
        let u = loop {
            let u = self.inner.next_real();
            if u > 0.0 {
                break u;
            }
        };
        self.normal.inverse_cdf(u)
    }

    /// Fill `out` with independent standard-normal deviates.
    pub fn fill(&mut self, out: &mut [Real]) {
        for v in out {
            *v = self.next_real();
        }
    }
}
