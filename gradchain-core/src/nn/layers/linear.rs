use crate::error::ChainError;
use crate::nn::init::fan_in_uniform;
use crate::nn::module::{check_context, check_input, replace_parameters, BackwardContext, Module};
use crate::ops::linalg::outer;
use crate::tensor::Tensor;
use log::debug;
use rand::rngs::StdRng;

/// Applies a linear transformation to the incoming column: `x = W · x_prev`.
///
/// `W` has shape `(dim_out, dim_in)`; its gradient has the same shape.
#[derive(Debug, Clone)]
pub struct Linear {
    weights: Tensor,
    grad: Option<Tensor>,
    dim_in: usize,
    dim_out: usize,
}

impl Linear {
    /// Creates a new Linear layer with fan-in scaled uniform weights.
    ///
    /// # Arguments
    /// * `dim_in` - Size of each input sample.
    /// * `dim_out` - Size of each output sample.
    /// * `scale` - The `k` in the initialization bound `k / sqrt(dim_in)`.
    ///
    /// # Errors
    /// Returns `ChainError::InvalidDimension` if either size is zero.
    pub fn new(dim_in: usize, dim_out: usize, scale: f64, rng: &mut StdRng) -> Result<Self, ChainError> {
        if dim_in == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Linear".to_string(),
                dim: "dim_in",
            });
        }
        if dim_out == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Linear".to_string(),
                dim: "dim_out",
            });
        }
        let weights = fan_in_uniform((dim_out, dim_in), dim_in, scale, rng)?;
        debug!("Linear: created {}x{} weights (scale {})", dim_out, dim_in, scale);
        Ok(Linear {
            weights,
            grad: None,
            dim_in,
            dim_out,
        })
    }

    /// Builds a layer around explicit `(dim_out, dim_in)` weights.
    pub fn from_weights(weights: Tensor) -> Result<Self, ChainError> {
        let (dim_out, dim_in) = weights.shape();
        if dim_in == 0 || dim_out == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Linear".to_string(),
                dim: if dim_in == 0 { "dim_in" } else { "dim_out" },
            });
        }
        Ok(Linear {
            weights,
            grad: None,
            dim_in,
            dim_out,
        })
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }
}

impl Module for Linear {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn dim_in(&self) -> usize {
        self.dim_in
    }

    fn dim_out(&self) -> usize {
        self.dim_out
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim_in)?;
        self.weights.matmul(input)
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim_in, self.dim_out)?;
        // dW = dx_next · x_prev^T, dx = W^T · dx_next
        self.grad = Some(outer(ctx.output_grad, ctx.input));
        self.weights.transpose().matmul(ctx.output_grad)
    }

    fn randomize(&mut self, scale: f64, rng: &mut StdRng) -> Result<(), ChainError> {
        self.weights = fan_in_uniform((self.dim_out, self.dim_in), self.dim_in, scale, rng)?;
        self.grad = None;
        Ok(())
    }

    fn parameters(&self) -> Option<&Tensor> {
        Some(&self.weights)
    }

    fn param_grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    fn set_parameters(&mut self, values: Tensor) -> Result<(), ChainError> {
        replace_parameters(self.name(), &mut self.weights, values)
    }

    fn clear_grad(&mut self) {
        self.grad = None;
    }
}

#[cfg(test)]
#[path = "linear_test.rs"]
mod tests;
