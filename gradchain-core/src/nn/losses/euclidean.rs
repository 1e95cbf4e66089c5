// gradchain-core/src/nn/losses/euclidean.rs

use crate::error::ChainError;
use crate::nn::losses::{check_operands, Loss, LossGradients, LossOutput};
use crate::tensor::Tensor;

/// Half squared Euclidean distance between prediction and target:
/// `E = 0.5 * ||z - y||^2`.
///
/// `losses` holds the per-element squared errors `(z_i - y_i)^2`.
#[derive(Debug, Clone)]
pub struct EuclideanLoss {
    dim: usize,
}

impl EuclideanLoss {
    pub fn new(dim: usize) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Euclidean".to_string(),
                dim: "dim_in",
            });
        }
        Ok(EuclideanLoss { dim })
    }
}

impl Loss for EuclideanLoss {
    fn name(&self) -> &'static str {
        "Euclidean"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossOutput, ChainError> {
        check_operands(self.name(), self.dim, prediction, target)?;
        let losses = prediction.zip_map(target, |z, y| (z - y) * (z - y))?;
        Ok(LossOutput {
            value: 0.5 * losses.sum(),
            losses,
        })
    }

    fn backward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossGradients, ChainError> {
        check_operands(self.name(), self.dim, prediction, target)?;
        let input_grad = prediction.sub(target)?;
        let target_grad = input_grad.scale(-1.0);
        Ok(LossGradients {
            input_grad,
            target_grad,
        })
    }
}

#[cfg(test)]
#[path = "euclidean_test.rs"]
mod tests;
