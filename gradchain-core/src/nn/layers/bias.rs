use crate::error::ChainError;
use crate::nn::init::fan_in_uniform;
use crate::nn::module::{check_context, check_input, replace_parameters, BackwardContext, Module};
use crate::tensor::Tensor;
use rand::rngs::StdRng;

/// Adds a learned offset: `x = x_prev + w`, with `w` a `(dim, 1)` column.
#[derive(Debug, Clone)]
pub struct Bias {
    bias: Tensor,
    grad: Option<Tensor>,
    dim: usize,
}

impl Bias {
    pub fn new(dim: usize, scale: f64, rng: &mut StdRng) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Bias".to_string(),
                dim: "dim_in",
            });
        }
        Ok(Bias {
            bias: fan_in_uniform((dim, 1), dim, scale, rng)?,
            grad: None,
            dim,
        })
    }
}

impl Module for Bias {
    fn name(&self) -> &'static str {
        "Bias"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim)?;
        input.add(&self.bias)
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim, self.dim)?;
        // Unit partials: both gradients are the incoming one.
        self.grad = Some(ctx.output_grad.clone());
        Ok(ctx.output_grad.clone())
    }

    fn randomize(&mut self, scale: f64, rng: &mut StdRng) -> Result<(), ChainError> {
        self.bias = fan_in_uniform((self.dim, 1), self.dim, scale, rng)?;
        self.grad = None;
        Ok(())
    }

    fn parameters(&self) -> Option<&Tensor> {
        Some(&self.bias)
    }

    fn param_grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    fn set_parameters(&mut self, values: Tensor) -> Result<(), ChainError> {
        replace_parameters(self.name(), &mut self.bias, values)
    }

    fn clear_grad(&mut self) {
        self.grad = None;
    }
}
