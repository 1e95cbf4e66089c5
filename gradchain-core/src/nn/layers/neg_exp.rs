use crate::error::ChainError;
use crate::nn::init::fan_in_uniform;
use crate::nn::module::{check_context, check_input, replace_parameters, BackwardContext, Module};
use crate::tensor::{scalar, Tensor};
use rand::rngs::StdRng;

/// Element-wise negative exponential with a shared scalar rate:
/// `x = exp(-w * z)`.
#[derive(Debug, Clone)]
pub struct NegExp {
    rate: Tensor,
    grad: Option<Tensor>,
    dim: usize,
}

impl NegExp {
    pub fn new(dim: usize, scale: f64, rng: &mut StdRng) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "NegExp".to_string(),
                dim: "dim_in",
            });
        }
        Ok(NegExp {
            rate: fan_in_uniform((1, 1), dim, scale, rng)?,
            grad: None,
            dim,
        })
    }
}

impl Module for NegExp {
    fn name(&self) -> &'static str {
        "NegExp"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim)?;
        let w = self.rate.item()?;
        Ok(input.map(|z| (-w * z).exp()))
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim, self.dim)?;
        let w = self.rate.item()?;
        // dw = -<g, z * x>
        let zx = ctx.input.mul(ctx.output)?;
        self.grad = Some(scalar(-ctx.output_grad.dot(&zx)?));
        ctx.output_grad.zip_map(ctx.output, |g, x| -w * g * x)
    }

    fn randomize(&mut self, scale: f64, rng: &mut StdRng) -> Result<(), ChainError> {
        self.rate = fan_in_uniform((1, 1), self.dim, scale, rng)?;
        self.grad = None;
        Ok(())
    }

    fn parameters(&self) -> Option<&Tensor> {
        Some(&self.rate)
    }

    fn param_grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    fn set_parameters(&mut self, values: Tensor) -> Result<(), ChainError> {
        replace_parameters(self.name(), &mut self.rate, values)
    }

    fn clear_grad(&mut self) {
        self.grad = None;
    }
}
