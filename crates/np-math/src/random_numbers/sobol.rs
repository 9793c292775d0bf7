//! Sobol low-discrepancy sequence (Gray-code construction with Joe–Kuo
//! direction numbers).

use np_core::{Error, Real, Result};

/// Maximum supported dimension for the Sobol sequence.
pub const MAX_DIMENSION: usize = 25;

/// Sobol quasi-random sequence generator.
pub struct SobolRsg {
    dimension: usize,
    sequence_count: u64,
    int_sequence: Vec<u32>,
    direction_numbers: Vec<[u32; BITS]>,
}

const BITS: usize = 32;

impl SobolRsg {
    /// Create a generator of the given dimension, skipping the first `skip`
    /// points.
    pub fn new(dimension: usize, skip: u64) -> Result<Self> {
        if dimension == 0 || dimension > MAX_DIMENSION {
            return Err(Error::InvalidArgument(format!(
                "Sobol dimension must be in [1, {MAX_DIMENSION}], got {dimension}"
            )));
        }
        let mut rsg = Self {
            dimension,
            sequence_count: 0,
            int_sequence: vec![0; dimension],
            direction_numbers: (0..dimension).map(direction_numbers).collect(),
        };
        for _ in 0..skip {
            rsg.advance();
        }
        Ok(rsg)
    }

    /// Dimension of the generated points.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generate the next point in `[0, 1)^d`.
    pub fn next_sequence(&mut self) -> Vec<Real> {
        self.advance();
        let norm = (1u64 << BITS) as Real;
        self.int_sequence
            .iter()
            .map(|&v| v as Real / norm)
            .collect()
    }

    fn advance(&mut self) {
        // Gray code: flip the direction number of the lowest zero bit.
        let c = (self.sequence_count.trailing_ones() as usize).min(BITS - 1);
        for (x, v) in self.int_sequence.iter_mut().zip(&self.direction_numbers) {
            *x ^= v[c];
        }
        self.sequence_count += 1;
    }
}

fn direction_numbers(dim: usize) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    if dim == 0 {
        // Van der Corput in base 2.
        for (i, slot) in v.iter_mut().enumerate() {
            *slot = 1u32 << (BITS - 1 - i);
        }
        return v;
    }
    let (degree, poly, initial) = JOE_KUO[dim - 1];
    for (i, &m) in initial.iter().enumerate() {
        v[i] = m << (BITS - 1 - i);
    }
    for i in degree..BITS {
        v[i] = v[i - degree] ^ (v[i - degree] >> degree);
        for k in 1..degree {
            if poly & (1 << (degree - 1 - k)) != 0 {
                v[i] ^= v[i - k];
            }
        }
    }
    v
}

/// `(degree, polynomial, initial direction numbers)` for dimensions 1..25,
/// from Joe & Kuo (2008).
const JOE_KUO: [(usize, u32, &[u32]); MAX_DIMENSION - 1] = [
    (1, 0, &[1]),
    (2, 1, &[1, 1]),
    (3, 1, &[1, 1, 1]),
    (3, 2, &[1, 3, 1]),
    (4, 1, &[1, 1, 1, 1]),
    (4, 4, &[1, 3, 3, 1]),
    (5, 2, &[1, 1, 1, 3, 3]),
    (5, 4, &[1, 3, 5, 13, 7]),
    (5, 7, &[1, 1, 5, 5, 15]),
    (5, 11, &[1, 3, 1, 7, 9]),
    (5, 13, &[1, 1, 3, 1, 13]),
    (5, 14, &[1, 1, 7, 13, 25]),
    (6, 1, &[1, 3, 7, 5, 29, 17]),
    (6, 13, &[1, 1, 5, 9, 5, 57]),
    (6, 16, &[1, 3, 1, 13, 25, 49]),
    (6, 19, &[1, 1, 3, 7, 17, 23]),
    (6, 22, &[1, 3, 5, 1, 15, 13]),
    (6, 25, &[1, 1, 1, 15, 7, 61]),
    (7, 1, &[1, 3, 1, 3, 5, 43, 79]),
    (7, 4, &[1, 1, 7, 5, 1, 35, 65]),
    (7, 7, &[1, 3, 3, 9, 31, 47, 3]),
    (7, 8, &[1, 1, 5, 7, 11, 15, 93]),
    (7, 14, &[1, 3, 7, 11, 17, 63, 111]),
    (7, 19, &[1, 1, 3, 3, 19, 37, 53]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_point_is_one_half() {
        let mut rsg = SobolRsg::new(1, 0).unwrap();
        assert!((rsg.next_sequence()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn points_in_unit_cube_with_uniform_mean() {
        let mut rsg = SobolRsg::new(3, 0).unwrap();
        let n = 4096;
        let mut sum = [0.0; 3];
        for _ in 0..n {
            let v = rsg.next_sequence();
            for (s, &x) in sum.iter_mut().zip(&v) {
                assert!((0.0..1.0).contains(&x));
                *s += x;
            }
        }
        for s in sum {
            assert!((s / n as Real - 0.5).abs() < 0.01);
        }
    }

    #[test]
    fn skip_matches_manual_advance() {
        let mut a = SobolRsg::new(2, 10).unwrap();
        let mut b = SobolRsg::new(2, 0).unwrap();
        for _ in 0..10 {
            b.next_sequence();
        }
        assert_eq!(a.next_sequence(), b.next_sequence());
    }

    #[test]
    fn rejects_unsupported_dimension() {
        assert!(SobolRsg::new(0, 0).is_err());
        assert!(SobolRsg::new(MAX_DIMENSION + 1, 0).is_err());
        assert!(SobolRsg::new(MAX_DIMENSION, 0).is_ok());
    }
}
