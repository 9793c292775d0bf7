//! Running statistics accumulator.

use np_core::Real;

/// Incremental statistics accumulator.
///
/// Accumulates weighted samples and reports mean, variance, standard
/// deviation, error estimate, min, max, and count.
#[derive(Debug, Clone)]
pub struct Statistics {
    count: usize,
    sum_w: Real,
    sum_wx: Real,
    sum_wx2: Real,
    min: Real,
    max: Real,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
            sum_wx2: 0.0,
            min: Real::INFINITY,
            max: Real::NEG_INFINITY,
        }
    }

    /// Add a single sample with weight 1.
    pub fn add(&mut self, x: Real) {
        self.add_weighted(x, 1.0);
    }

    /// Add a weighted sample.
    pub fn add_weighted(&mut self, x: Real, weight: Real) {
        self.count += 1;
        self.sum_w += weight;
        self.sum_wx += weight * x;
        self.sum_wx2 += weight * x * x;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Weighted mean.  `None` if no samples have been added.
    pub fn mean(&self) -> Option<Real> {
        (self.sum_w != 0.0).then(|| self.sum_wx / self.sum_w)
    }

    /// Weighted, Bessel-corrected variance.  `None` for fewer than 2 samples.
    pub fn variance(&self) -> Option<Real> {
        if self.sum_w == 0.0 || self.count < 2 {
            return None;
        }
        let m = self.sum_wx / self.sum_w;
        let s2 = (self.sum_wx2 / self.sum_w - m * m).max(0.0);
        Some(s2 * self.count as Real / (self.count as Real - 1.0))
    }

    /// Standard deviation.
    pub fn std_dev(&self) -> Option<Real> {
        self.variance().map(Real::sqrt)
    }

    /// Standard error of the mean.
    pub fn error_estimate(&self) -> Option<Real> {
        self.variance().map(|v| (v / self.count as Real).sqrt())
    }

    /// Smallest sample.
    pub fn minimum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest sample.
    pub fn maximum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.max)
    }
}
