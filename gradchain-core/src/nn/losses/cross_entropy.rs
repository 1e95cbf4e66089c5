use crate::error::ChainError;
use crate::nn::losses::{check_operands, Loss, LossGradients, LossOutput};
use crate::tensor::{column, Tensor};
use std::f64::consts::LN_2;

/// Cross-entropy in bits against an indicator target:
/// `E = -sum_{k: y_k > 0} y_k * log2(z_k)`.
///
/// Only active classes (`y_k > 0`) contribute. This matches the full
/// cross-entropy when `y` is 0/1 valued; it is not a general KL divergence.
#[derive(Debug, Clone)]
pub struct CrossEntropyLoss {
    dim: usize,
}

impl CrossEntropyLoss {
    pub fn new(dim: usize) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "CrossEntropy".to_string(),
                dim: "dim_in",
            });
        }
        Ok(CrossEntropyLoss { dim })
    }

    /// `z_k` at an active class must be a finite, strictly positive probability.
    fn check_probability(&self, k: usize, z: f64) -> Result<(), ChainError> {
        if !(z.is_finite() && z > 0.0) {
            return Err(ChainError::domain(
                self.name(),
                format!("probability {} at active class {}", z, k),
            ));
        }
        Ok(())
    }
}

impl Loss for CrossEntropyLoss {
    fn name(&self) -> &'static str {
        "CrossEntropy"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossOutput, ChainError> {
        check_operands(self.name(), self.dim, prediction, target)?;
        let mut losses = vec![0.0; self.dim];
        for (k, (&z, &y)) in prediction.data().iter().zip(target.data()).enumerate() {
            if y > 0.0 {
                self.check_probability(k, z)?;
                losses[k] = -y * z.log2();
            }
        }
        Ok(LossOutput {
            value: losses.iter().sum(),
            losses: column(losses),
        })
    }

    fn backward(&self, prediction: &Tensor, target: &Tensor) -> Result<LossGradients, ChainError> {
        check_operands(self.name(), self.dim, prediction, target)?;
        let mut dx = vec![0.0; self.dim];
        let mut dy = vec![0.0; self.dim];
        for (k, (&z, &y)) in prediction.data().iter().zip(target.data()).enumerate() {
            if y > 0.0 {
                self.check_probability(k, z)?;
                dx[k] = -(y / z) / LN_2;
                dy[k] = -z.log2();
            }
        }
        Ok(LossGradients {
            input_grad: column(dx),
            target_grad: column(dy),
        })
    }
}
