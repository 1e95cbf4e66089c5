use crate::error::ChainError;
use crate::nn::module::{check_context, check_input, BackwardContext, Module};
use crate::tensor::Tensor;

/// Element-wise `tanh` squashing non-linearity.
///
/// This layer does not have any learnable parameters.
#[derive(Debug, Clone)]
pub struct Sigmoid {
    dim: usize,
}

impl Sigmoid {
    pub fn new(dim: usize) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Sigmoid".to_string(),
                dim: "dim_in",
            });
        }
        Ok(Sigmoid { dim })
    }
}

impl Module for Sigmoid {
    fn name(&self) -> &'static str {
        "Sigmoid"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim)?;
        Ok(input.map(f64::tanh))
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim, self.dim)?;
        // d tanh(z) / dz = 1 - tanh(z)^2, read off the stored activation.
        ctx.output_grad.zip_map(ctx.output, |g, t| g * (1.0 - t * t))
    }
}
