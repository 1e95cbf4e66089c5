// src/nn/losses/mod.rs

pub mod cross_entropy;
pub mod euclidean;

pub use cross_entropy::CrossEntropyLoss;
pub use euclidean::EuclideanLoss;

use crate::error::ChainError;
use crate::tensor::Tensor;

/// Result of evaluating a loss on one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOutput {
    /// The scalar objective.
    pub value: f64,
    /// Per-element contributions, a `(dim_in, 1)` column kept for diagnostics.
    pub losses: Tensor,
}

/// Gradients produced by a loss: with respect to the prediction (`dx`) and
/// with respect to the target (`dy`). Both are `(dim_in, 1)` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LossGradients {
    pub input_grad: Tensor,
    pub target_grad: Tensor,
}

/// Terminal modules of a chain.
///
/// A loss has no successor: its backward step starts from the prediction
/// and the target instead of an incoming gradient.
pub trait Loss: std::fmt::Debug + Send {
    fn name(&self) -> &'static str;

    /// Dimension of both the prediction and the target.
    fn dim_in(&self) -> usize;

    fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossOutput, ChainError>;

    fn backward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossGradients, ChainError>;
}

/// Both operands must be `(dim, 1)` columns.
pub(crate) fn check_operands(
    name: &str,
    dim: usize,
    prediction: &Tensor,
    target: &Tensor,
) -> Result<(), ChainError> {
    for t in [prediction, target] {
        if t.shape() != (dim, 1) {
            return Err(ChainError::ShapeMismatch {
                expected: (dim, 1),
                actual: t.shape(),
                operation: format!("{} loss", name),
            });
        }
    }
    Ok(())
}
