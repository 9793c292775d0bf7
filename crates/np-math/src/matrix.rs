//! `Matrix` — a two-dimensional matrix of reals.
//!
//! A thin newtype around `nalgebra::DMatrix<f64>`, used for diffusion
//! coefficients of multi-dimensional stochastic processes.

use crate::array::Array;
use nalgebra::DMatrix;
use np_core::Real;
use std::ops::{Index, IndexMut};

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create an identity matrix of size `n × n`.
    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    /// Create a square diagonal matrix from its diagonal.
    pub fn from_diagonal(diagonal: &Array) -> Self {
        let n = diagonal.size();
        let mut m = DMatrix::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = diagonal[i];
        }
        Self(m)
    }

    /// Create from a row-major data slice.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Return `true` if all elements are zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// `true` when every element is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Matrix-vector product `A · x`.
    pub fn mul_array(&self, x: &Array) -> Array {
        debug_assert_eq!(self.cols(), x.size());
        let mut y = Array::zeros(self.rows());
        for r in 0..self.rows() {
            let mut acc = 0.0;
            for c in 0..self.cols() {
                acc += self.0[(r, c)] * x[c];
            }
            y[r] = acc;
        }
        y
    }

    /// Scale every element in place.
    pub fn scale_mut(&mut self, factor: Real) {
        self.0 *= factor;
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, (r, c): (usize, usize)) -> &Real {
        &self.0[(r, c)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Real {
        &mut self.0[(r, c)]
    }
}
