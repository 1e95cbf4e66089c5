use crate::error::ChainError;
use crate::nn::module::{check_context, check_input, replace_parameters, BackwardContext, Module};
use crate::tensor::{column, Tensor};

/// Radial basis layer: one output per template column,
/// `x_k = 0.5 * sum_i (z_i - T_ik)^2`.
///
/// The `(dim_in, dim_out)` template matrix is the module's parameter. It is
/// supplied at construction and never randomized.
#[derive(Debug, Clone)]
pub struct Rbf {
    templates: Tensor,
    grad: Option<Tensor>,
}

impl Rbf {
    /// # Errors
    /// Returns `ChainError::InvalidTemplates` for an empty template matrix.
    pub fn new(templates: Tensor) -> Result<Self, ChainError> {
        let (rows, cols) = templates.shape();
        if rows == 0 || cols == 0 {
            return Err(ChainError::InvalidTemplates {
                reason: format!("template matrix must be non-empty, got {}x{}", rows, cols),
            });
        }
        if templates.data().iter().any(|t| !t.is_finite()) {
            return Err(ChainError::InvalidTemplates {
                reason: "template matrix contains non-finite values".to_string(),
            });
        }
        Ok(Rbf {
            templates,
            grad: None,
        })
    }

    pub fn templates(&self) -> &Tensor {
        &self.templates
    }
}

impl Module for Rbf {
    fn name(&self) -> &'static str {
        "RBF"
    }

    fn dim_in(&self) -> usize {
        self.templates.rows()
    }

    fn dim_out(&self) -> usize {
        self.templates.cols()
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError> {
        check_input(self.name(), input, self.dim_in())?;
        let z = input.data();
        let out = (0..self.dim_out())
            .map(|k| {
                0.5 * z
                    .iter()
                    .enumerate()
                    .map(|(i, &zi)| (zi - self.templates.at(i, k)).powi(2))
                    .sum::<f64>()
            })
            .collect();
        Ok(column(out))
    }

    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError> {
        check_context(self.name(), ctx, self.dim_in(), self.dim_out())?;
        let (dim_in, dim_out) = self.templates.shape();
        let z = ctx.input.data();
        let g = ctx.output_grad.data();

        // dw_ik = g_k (T_ik - z_i); dx_i = -sum_k dw_ik
        let mut dw = Vec::with_capacity(dim_in * dim_out);
        let mut dx = vec![0.0; dim_in];
        for i in 0..dim_in {
            for k in 0..dim_out {
                let d = g[k] * (self.templates.at(i, k) - z[i]);
                dw.push(d);
                dx[i] -= d;
            }
        }
        self.grad = Some(Tensor::new(dw, (dim_in, dim_out))?);
        Ok(column(dx))
    }

    fn parameters(&self) -> Option<&Tensor> {
        Some(&self.templates)
    }

    fn param_grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    fn set_parameters(&mut self, values: Tensor) -> Result<(), ChainError> {
        replace_parameters(self.name(), &mut self.templates, values)
    }

    fn clear_grad(&mut self) {
        self.grad = None;
    }
}
