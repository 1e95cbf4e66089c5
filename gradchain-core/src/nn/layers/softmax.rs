use crate::error::ChainError;
use crate::nn::init::fan_in_uniform;
use crate::nn::module::{check_context, check_input, replace_parameters, BackwardContext, Module};
use crate::tensor::{column, scalar, Tensor};
use rand::rngs::StdRng;

/// Normalized exponential with a single learned temperature `w`:
///
/// `x_i = exp(-w z_i) / sum_j exp(-w z_j)`
///
/// The local Jacobian `diag(x) - x x^T` is dense, so every input gradient
/// coordinate mixes all of the incoming gradient.
///
/// When `-w z` overflows, the output is the limit distribution: uniform over
/// the entries at the extreme logit and zero elsewhere. A NaN logit is a
/// domain error.
#[derive(Debug, Clone)]
pub struct SoftMax {
    temperature: Tensor,
    grad: Option<Tensor>,
    dim: usize,
}

impl SoftMax {
    pub fn new(dim: usize, scale: f64, rng: &mut StdRng) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "SoftMax".to_string(),
                dim: "dim_in",
            });
        }
        Ok(SoftMax {
            temperature: fan_in_uniform((1, 1), dim, scale, rng)?,
            grad: None,
            dim,
        })
    }

    /// Builds a softmax with a fixed temperature.
    pub fn with_temperature(dim: usize, w: f64) -> Result<Self, ChainError> {
        if dim == 0 {
            return Err(ChainError::InvalidDimension {
                module: "SoftMax".to_string(),
                dim: "dim_in",
            });
        }
        Ok(SoftMax {
            temperature: scalar(w),
            grad: None,
            dim,
        })
    }
}

impl Module for SoftMax {
    fn name(&self) -> &'static str {
        "SoftMax"
    }

    fn dim_in(&self) -> usize {
        self.dim
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim)?;
        let w = self.temperature.item()?;
        let logits: Vec<f64> = input.data().iter().map(|&z| -w * z).collect();
        if let Some(i) = logits.iter().position(|a| a.is_nan()) {
            return Err(ChainError::domain(
                self.name(),
                format!("logit {} is NaN (temperature {})", i, w),
            ));
        }
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if max.is_infinite() {
            // -w z overflowed: all mass goes to the entries at the extreme.
            let hits = logits.iter().filter(|&&a| a == max).count() as f64;
            return Ok(column(
                logits
                    .iter()
                    .map(|&a| if a == max { 1.0 / hits } else { 0.0 })
                    .collect(),
            ));
        }
        // Shift by the max so exp never overflows.
        let weights: Vec<f64> = logits.iter().map(|a| (a - max).exp()).collect();
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(ChainError::domain(
                self.name(),
                format!("normalizer is {} (temperature {})", total, w),
            ));
        }
        Ok(column(weights.into_iter().map(|e| e / total).collect()))
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim, self.dim)?;
        let w = self.temperature.item()?;
        let x = ctx.output.data();
        let z = ctx.input.data();
        let g = ctx.output_grad.data();

        // (diag(x) - x x^T) g = x * (g - <x, g>)
        let xg: f64 = x.iter().zip(g).map(|(a, b)| a * b).sum();
        let dx: Vec<f64> = x
            .iter()
            .zip(g)
            .map(|(&xi, &gi)| -w * xi * (gi - xg))
            .collect();

        // mu = E_x[z]; dx_i/dw = x_i * (mu - z_i)
        let mu: f64 = x.iter().zip(z).map(|(a, b)| a * b).sum();
        let dw: f64 = g
            .iter()
            .zip(x.iter().zip(z))
            .map(|(&gi, (&xi, &zi))| gi * (xi * mu - zi * xi))
            .sum();
        self.grad = Some(scalar(dw));
        Ok(column(dx))
    }

    fn randomize(&mut self, scale: f64, rng: &mut StdRng) -> Result<(), ChainError> {
        self.temperature = fan_in_uniform((1, 1), self.dim, scale, rng)?;
        self.grad = None;
        Ok(())
    }

    fn parameters(&self) -> Option<&Tensor> {
        Some(&self.temperature)
    }

    fn param_grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    fn set_parameters(&mut self, values: Tensor) -> Result<(), ChainError> {
        replace_parameters(self.name(), &mut self.temperature, values)
    }

    fn clear_grad(&mut self) {
        self.grad = None;
    }
}

#[cfg(test)]
#[path = "softmax_test.rs"]
mod tests;
