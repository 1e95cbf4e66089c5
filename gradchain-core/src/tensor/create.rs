use crate::error::ChainError;
use crate::tensor::Tensor;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::StandardNormal;

/// Creates a tensor of the given shape filled with zeros.
pub fn zeros(shape: (usize, usize)) -> Tensor {
    full(shape, 0.0)
}

/// Creates a tensor of the given shape filled with `value`.
pub fn full(shape: (usize, usize), value: f64) -> Tensor {
    let (rows, cols) = shape;
    Tensor {
        rows,
        cols,
        data: vec![value; rows * cols],
    }
}

/// Wraps `values` into a column vector of shape `(len, 1)`.
pub fn column(values: Vec<f64>) -> Tensor {
    Tensor {
        rows: values.len(),
        cols: 1,
        data: values,
    }
}

/// A `(1, 1)` tensor.
pub fn scalar(value: f64) -> Tensor {
    full((1, 1), value)
}

/// Samples every element uniformly from `[low, high]`.
///
/// # Errors
/// Returns `ChainError::InvalidState` if `low > high` or either bound is not finite.
pub fn rand_uniform<R: Rng + ?Sized>(
    shape: (usize, usize),
    low: f64,
    high: f64,
    rng: &mut R,
) -> Result<Tensor, ChainError> {
    if !(low.is_finite() && high.is_finite()) || low > high {
        return Err(ChainError::InvalidState(format!(
            "invalid uniform bounds [{}, {}]",
            low, high
        )));
    }
    let dist = Uniform::new_inclusive(low, high);
    let numel = shape.0 * shape.1;
    let data_vec: Vec<f64> = (0..numel).map(|_| dist.sample(rng)).collect();
    Tensor::new(data_vec, shape)
}

/// Samples every element from the standard normal distribution.
pub fn randn<R: Rng + ?Sized>(shape: (usize, usize), rng: &mut R) -> Tensor {
    let (rows, cols) = shape;
    let data: Vec<f64> = (0..rows * cols)
        .map(|_| StandardNormal.sample(rng))
        .collect();
    Tensor { rows, cols, data }
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
