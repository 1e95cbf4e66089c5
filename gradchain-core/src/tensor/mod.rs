// src/tensor/mod.rs

use crate::error::ChainError;
use crate::ops;
use std::fmt;

pub mod create;

// Re-export creation functions to make them public
pub use create::{column, full, rand_uniform, randn, scalar, zeros};

/// A dense, row-major, two-dimensional `f64` matrix.
///
/// Vectors are column matrices of shape `(n, 1)`; every activation and every
/// gradient flowing through a chain uses that orientation. Scalar parameters
/// are `(1, 1)` matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Tensor {
    /// Creates a new Tensor with the given data and shape.
    ///
    /// # Errors
    /// Returns `ChainError::TensorCreationError` if `data.len() != rows * cols`.
    pub fn new(data: Vec<f64>, shape: (usize, usize)) -> Result<Self, ChainError> {
        let (rows, cols) = shape;
        if data.len() != rows * cols {
            return Err(ChainError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        Ok(Tensor { rows, cols, data })
    }

    /// Builds a tensor whose length the caller has already matched to `shape`.
    pub(crate) fn from_raw(data: Vec<f64>, shape: (usize, usize)) -> Self {
        debug_assert_eq!(data.len(), shape.0 * shape.1);
        Tensor {
            rows: shape.0,
            cols: shape.1,
            data,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat, row-major view of the elements.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Element at `(row, col)`. Panics when out of bounds, like slice indexing.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.cols, "index ({}, {}) out of bounds for {:?}", row, col, self.shape());
        self.data[row * self.cols + col]
    }

    /// Returns the single element of a `(1, 1)` tensor.
    pub fn item(&self) -> Result<f64, ChainError> {
        if self.shape() != (1, 1) {
            return Err(ChainError::ShapeMismatch {
                expected: (1, 1),
                actual: self.shape(),
                operation: "item".to_string(),
            });
        }
        Ok(self.data[0])
    }

    pub fn is_column(&self) -> bool {
        self.cols == 1
    }

    pub fn matmul(&self, other: &Tensor) -> Result<Tensor, ChainError> {
        ops::linalg::matmul(self, other)
    }

    pub fn transpose(&self) -> Tensor {
        ops::linalg::transpose(self)
    }

    pub fn dot(&self, other: &Tensor) -> Result<f64, ChainError> {
        ops::linalg::dot(self, other)
    }

    pub fn norm(&self) -> f64 {
        ops::linalg::norm(self)
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        ops::elementwise::map(self, f)
    }

    pub fn zip_map<F>(&self, other: &Tensor, f: F) -> Result<Tensor, ChainError>
    where
        F: Fn(f64, f64) -> f64,
    {
        ops::elementwise::zip_map(self, other, f)
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor, ChainError> {
        ops::elementwise::add(self, other)
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor, ChainError> {
        ops::elementwise::sub(self, other)
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor, ChainError> {
        ops::elementwise::mul(self, other)
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|x| x * factor)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor ({} x {}) {:?}", self.rows, self.cols, self.data)
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
