// gradchain-core/src/ops/linalg.rs

use crate::error::ChainError;
use crate::ops::check_same_shape;
use crate::tensor::Tensor;

/// Matrix product `a · b`.
///
/// # Errors
/// Returns `ChainError::ShapeMismatch` if `a.cols() != b.rows()`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, ChainError> {
    if a.cols() != b.rows() {
        return Err(ChainError::ShapeMismatch {
            expected: (a.cols(), b.cols()),
            actual: b.shape(),
            operation: "matmul".to_string(),
        });
    }
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let lhs = a.data();
    let rhs = b.data();
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        let row = &lhs[i * k..(i + 1) * k];
        for j in 0..n {
            out[i * n + j] = row
                .iter()
                .enumerate()
                .map(|(p, &x)| x * rhs[p * n + j])
                .sum();
        }
    }
    Ok(Tensor::from_raw(out, (m, n)))
}

pub fn transpose(a: &Tensor) -> Tensor {
    let (rows, cols) = a.shape();
    let src = a.data();
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = src[i * cols + j];
        }
    }
    Tensor::from_raw(out, (cols, rows))
}

/// Outer product `u · v^T` of two vectors (any orientation), shape `(len(u), len(v))`.
pub fn outer(u: &Tensor, v: &Tensor) -> Tensor {
    let (m, n) = (u.numel(), v.numel());
    let mut out = Vec::with_capacity(m * n);
    for &a in u.data() {
        out.extend(v.data().iter().map(|&b| a * b));
    }
    Tensor::from_raw(out, (m, n))
}

/// Inner product of two same-shaped tensors.
pub fn dot(a: &Tensor, b: &Tensor) -> Result<f64, ChainError> {
    check_same_shape(a, b, "dot")?;
    Ok(a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum())
}

/// Euclidean (Frobenius) norm.
pub fn norm(a: &Tensor) -> f64 {
    a.data().iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
#[path = "linalg_test.rs"]
mod tests;
