// src/ops/mod.rs
// Dense linear algebra and element-wise kernels used by the modules.

pub mod elementwise;
pub mod linalg;

use crate::error::ChainError;
use crate::tensor::Tensor;

/// Fails with `ChainError::ShapeMismatch` unless both tensors share a shape.
pub(crate) fn check_same_shape(a: &Tensor, b: &Tensor, operation: &str) -> Result<(), ChainError> {
    if a.shape() != b.shape() {
        return Err(ChainError::ShapeMismatch {
            expected: a.shape(),
            actual: b.shape(),
            operation: operation.to_string(),
        });
    }
    Ok(())
}
