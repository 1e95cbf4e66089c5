use crate::error::ChainError;
use crate::model::{Chain, ChainBuilder};
use crate::nn::{Loss, Module};
use crate::tensor::{column, Tensor};
use log::{debug, info, warn};
use std::fmt;
use thiserror::Error;

/// Which derivative a comparison is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// `dE/dx` with respect to the sample fed into the chain.
    Input,
    /// `dE/dw` with respect to a module's parameters.
    Parameters,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Input => write!(f, "input"),
            Quantity::Parameters => write!(f, "parameters"),
        }
    }
}

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for {module} {quantity}: mean |analytic - numeric| = {mean_abs_diff:e} exceeds tolerance {tolerance:e}")]
    Mismatch {
        module: String,
        quantity: Quantity,
        mean_abs_diff: f64,
        tolerance: f64,
    },
    #[error("Numerical gradient is NaN or infinite for {module} {quantity}, element {element_index}. Loss+: {loss_plus:?}, Loss-: {loss_minus:?}")]
    NumericalGradNaNOrInfinite {
        module: String,
        quantity: Quantity,
        element_index: usize,
        loss_plus: f64,
        loss_minus: f64,
    },
    #[error("Analytical gradient is NaN or infinite for {module} {quantity}, element {element_index}. Value: {value:?}")]
    AnalyticalGradNaNOrInfinite {
        module: String,
        quantity: Quantity,
        element_index: usize,
        value: f64,
    },
    #[error("{module} has no analytical {quantity} gradient after the backward pass")]
    MissingAnalyticalGrad { module: String, quantity: Quantity },
    #[error("Invalid gradient check configuration: {0}")]
    InvalidConfig(String),
    #[error("Chain error during gradient check: {0}")]
    Chain(ChainError),
}

impl From<ChainError> for GradCheckError {
    fn from(err: ChainError) -> Self {
        GradCheckError::Chain(err)
    }
}

/// One analytic-versus-numeric comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientComparison {
    /// `describe()` of the module owning the quantity.
    pub module: String,
    pub quantity: Quantity,
    pub analytic: Tensor,
    pub numeric: Tensor,
    pub mean_abs_diff: f64,
    pub max_abs_diff: f64,
}

/// Everything a successful check compared.
#[derive(Debug, Clone, PartialEq)]
pub struct GradCheckReport {
    pub epsilon: f64,
    pub tolerance: f64,
    pub comparisons: Vec<GradientComparison>,
}

impl GradCheckReport {
    /// The comparison for `quantity` of the module described as `module`.
    pub fn find(&self, module: &str, quantity: Quantity) -> Option<&GradientComparison> {
        self.comparisons
            .iter()
            .find(|c| c.module == module && c.quantity == quantity)
    }
}

/// Central finite-difference checker.
///
/// For a chain and a sample `(x, y)` it compares the analytic input gradient
/// of the first position after the input, and the analytic parameter
/// gradient of every parametric module, against
/// `(E(v + eps) - E(v - eps)) / (2 eps)` evaluated one coordinate at a time.
/// A quantity passes when the mean absolute difference is within the
/// tolerance, which defaults to `epsilon`.
///
/// Only the public [`Chain`] surface is used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheck {
    epsilon: f64,
    tolerance: Option<f64>,
}

impl GradCheck {
    pub fn new(epsilon: f64) -> Self {
        GradCheck {
            epsilon,
            tolerance: None,
        }
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn effective_tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(self.epsilon)
    }

    fn validate(&self) -> Result<(), GradCheckError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(GradCheckError::InvalidConfig(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        let tolerance = self.effective_tolerance();
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(GradCheckError::InvalidConfig(format!(
                "tolerance must be non-negative and finite, got {}",
                tolerance
            )));
        }
        Ok(())
    }

    /// Checks `module` inside `Input → module → loss`.
    pub fn check_module(
        &self,
        module: Box<dyn Module>,
        loss: Box<dyn Loss>,
        x: Tensor,
        y: Tensor,
    ) -> Result<GradCheckReport, GradCheckError> {
        let mut chain = ChainBuilder::new(module.dim_in(), loss.dim_in())?
            .push(module)?
            .finish(loss)?;
        self.check_chain(&mut chain, x, y)
    }

    /// Checks the loss itself inside `Input → loss`.
    pub fn check_loss(
        &self,
        loss: Box<dyn Loss>,
        x: Tensor,
        y: Tensor,
    ) -> Result<GradCheckReport, GradCheckError> {
        let mut chain = ChainBuilder::new(loss.dim_in(), loss.dim_in())?.finish(loss)?;
        self.check_chain(&mut chain, x, y)
    }

    /// Checks an already-built chain on the sample `(x, y)`.
    ///
    /// Parameters are restored to their original values before returning.
    pub fn check_chain(
        &self,
        chain: &mut Chain,
        x: Tensor,
        y: Tensor,
    ) -> Result<GradCheckReport, GradCheckError> {
        self.validate()?;
        let tolerance = self.effective_tolerance();
        debug!(
            "GradCheck: epsilon {:e}, tolerance {:e}, {} positions",
            self.epsilon,
            tolerance,
            chain.len()
        );

        // Analytic gradients first: perturbing parameters invalidates them.
        chain.set_sample(x.clone(), y.clone())?;
        chain.forward()?;
        chain.backward()?;

        let first = chain
            .successor(chain.input_id())
            .ok_or(ChainError::UnknownModule(1))?;
        let first_name = chain.describe(first)?;
        let analytic_dx = chain
            .input_gradient(first)?
            .cloned()
            .ok_or_else(|| GradCheckError::MissingAnalyticalGrad {
                module: first_name.clone(),
                quantity: Quantity::Input,
            })?;

        let mut parametric = Vec::new();
        for id in chain.module_ids() {
            if let Some(params) = chain.parameters(id)?.cloned() {
                let name = chain.describe(id)?;
                let grad = chain.gradient(id)?.cloned().ok_or_else(|| {
                    GradCheckError::MissingAnalyticalGrad {
                        module: name.clone(),
                        quantity: Quantity::Parameters,
                    }
                })?;
                parametric.push((id, name, params, grad));
            }
        }

        let mut comparisons = Vec::with_capacity(parametric.len() + 1);

        // dx: perturb the sample.
        // The sample was accepted above, so it is a vector of length dim_x.
        let x = column(x.into_vec());
        let numeric_dx = self.central_differences(&first_name, Quantity::Input, &x, |v| {
            chain.set_sample(v, y.clone())?;
            chain.forward()
        })?;
        comparisons.push(compare(first_name, Quantity::Input, analytic_dx, numeric_dx)?);

        // dw: perturb each parameter tensor with the original sample installed.
        chain.set_sample(x.clone(), y.clone())?;
        for (id, name, params, grad) in parametric {
            let numeric = self.central_differences(&name, Quantity::Parameters, &params, |v| {
                chain.set_parameters(id, v)?;
                chain.forward()
            });
            chain.set_parameters(id, params)?;
            comparisons.push(compare(name, Quantity::Parameters, grad, numeric?)?);
        }

        let mut failure = None;
        for c in &comparisons {
            if c.mean_abs_diff <= tolerance {
                info!(
                    "GradCheck: {} {} ok (mean {:e}, max {:e})",
                    c.module, c.quantity, c.mean_abs_diff, c.max_abs_diff
                );
            } else {
                warn!(
                    "GradCheck: {} {} FAILED (mean {:e} > {:e})",
                    c.module, c.quantity, c.mean_abs_diff, tolerance
                );
                failure.get_or_insert_with(|| GradCheckError::Mismatch {
                    module: c.module.clone(),
                    quantity: c.quantity,
                    mean_abs_diff: c.mean_abs_diff,
                    tolerance,
                });
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(GradCheckReport {
                epsilon: self.epsilon,
                tolerance,
                comparisons,
            }),
        }
    }

    /// Estimates `dE/dv` coordinate by coordinate, `loss_at` evaluating `E`.
    fn central_differences<F>(
        &self,
        module: &str,
        quantity: Quantity,
        origin: &Tensor,
        mut loss_at: F,
    ) -> Result<Tensor, GradCheckError>
    where
        F: FnMut(Tensor) -> Result<f64, ChainError>,
    {
        let eps = self.epsilon;
        let mut estimate = Vec::with_capacity(origin.numel());
        for element_index in 0..origin.numel() {
            let loss_plus = loss_at(perturbed(origin, element_index, eps))?;
            let loss_minus = loss_at(perturbed(origin, element_index, -eps))?;
            let numerical_grad = (loss_plus - loss_minus) / (2.0 * eps);
            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    module: module.to_string(),
                    quantity,
                    element_index,
                    loss_plus,
                    loss_minus,
                });
            }
            estimate.push(numerical_grad);
        }
        Ok(Tensor::new(estimate, origin.shape())?)
    }
}

fn perturbed(origin: &Tensor, index: usize, delta: f64) -> Tensor {
    let mut t = origin.clone();
    t.data_mut()[index] += delta;
    t
}

fn compare(
    module: String,
    quantity: Quantity,
    analytic: Tensor,
    numeric: Tensor,
) -> Result<GradientComparison, GradCheckError> {
    if let Some((element_index, &value)) = analytic
        .data()
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(GradCheckError::AnalyticalGradNaNOrInfinite {
            module,
            quantity,
            element_index,
            value,
        });
    }
    let diff = analytic.sub(&numeric)?;
    let n = diff.numel().max(1) as f64;
    let mean_abs_diff = diff.data().iter().map(|d| d.abs()).sum::<f64>() / n;
    let max_abs_diff = diff.data().iter().fold(0.0_f64, |m, d| m.max(d.abs()));
    Ok(GradientComparison {
        module,
        quantity,
        analytic,
        numeric,
        mean_abs_diff,
        max_abs_diff,
    })
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
