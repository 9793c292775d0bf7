//! Deterministic parallel reduction of per-item losses and gradients.
//!
//! Items are split into fixed-size chunks evaluated on the rayon pool; the
//! chunk results are collected in order and summed sequentially, so the
//! floating-point result does not depend on thread scheduling.

use np_core::{Real, Result};
use rayon::prelude::*;

/// Items per parallel task.
const CHUNK: usize = 32;

/// Sum of per-item values and gradients.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Accumulated {
    pub count: usize,
    pub discarded: usize,
    pub sum: Real,
    pub gradient: Vec<Real>,
}

impl Accumulated {
    fn empty(dimension: usize) -> Self {
        Self {
            count: 0,
            discarded: 0,
            sum: 0.0,
            gradient: vec![0.0; dimension],
        }
    }

    fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.discarded += other.discarded;
        self.sum += other.sum;
        for (g, o) in self.gradient.iter_mut().zip(&other.gradient) {
            *g += o;
        }
    }
}

/// Evaluate `f` on every item and accumulate the results.
///
/// `f` returns `Ok(None)` for items that must be discarded, otherwise the
/// item's value and its gradient of length `dimension`. The first error in
/// item order is returned.
pub(crate) fn accumulate<T, F>(items: &[T], dimension: usize, f: F) -> Result<Accumulated>
where
    T: Sync,
    F: Fn(&T) -> Result<Option<(Real, Vec<Real>)>> + Sync,
{
    let partials: Vec<Result<Accumulated>> = items
        .par_chunks(CHUNK)
        .map(|chunk| {
            let mut acc = Accumulated::empty(dimension);
            for item in chunk {
                match f(item)? {
                    Some((value, gradient)) => {
                        acc.count += 1;
                        acc.sum += value;
                        for (g, d) in acc.gradient.iter_mut().zip(&gradient) {
                            *g += d;
                        }
                    }
                    None => acc.discarded += 1,
                }
            }
            Ok(acc)
        })
        .collect();

    let mut total = Accumulated::empty(dimension);
    for partial in partials {
        total.merge(&partial?);
    }
    Ok(total)
}
