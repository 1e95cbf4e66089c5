use crate::error::ChainError;
use crate::tensor::Tensor;
use rand::rngs::StdRng;

/// Everything a module's `backward` hook may read.
///
/// All three tensors are column vectors produced by the most recent forward
/// pass on the current sample.
#[derive(Debug, Clone, Copy)]
pub struct BackwardContext<'a> {
    /// The predecessor's activation (this module's forward input), `(dim_in, 1)`.
    pub input: &'a Tensor,
    /// This module's own activation, `(dim_out, 1)`.
    pub output: &'a Tensor,
    /// The successor's input gradient, `(dim_out, 1)`.
    pub output_grad: &'a Tensor,
}

/// The base trait for interior modules of a chain (transforms between the
/// input and the loss).
///
/// A module owns its parameters and their gradient. Activations and input
/// gradients are scratch values owned by the chain position the module
/// occupies; the module receives them through `forward`'s argument and
/// the `BackwardContext`, and returns its own.
pub trait Module: std::fmt::Debug + Send {
    /// Short human-readable name, used in diagnostics and errors.
    fn name(&self) -> &'static str;

    fn dim_in(&self) -> usize;

    /// Defaults to `dim_in` for shape-preserving modules.
    fn dim_out(&self) -> usize {
        self.dim_in()
    }

    /// Computes the module's activation from its predecessor's.
    ///
    /// # Arguments
    /// * `input`: the predecessor's activation, a `(dim_in, 1)` column.
    ///
    /// # Returns
    /// The `(dim_out, 1)` activation.
    fn forward(&self, input: &Tensor) -> Result<Tensor, ChainError>;

    /// Computes the gradient with respect to the module input, and stores the
    /// parameter gradient if the module has parameters.
    ///
    /// # Returns
    /// The `(dim_in, 1)` input gradient.
    fn backward(&mut self, ctx: &BackwardContext<'_>) -> Result<Tensor, ChainError>;

    /// Re-draws the parameters. `scale` is the `k` in the fan-in bound
    /// `k / sqrt(dim_in)`. No-op for modules without randomizable parameters.
    fn randomize(&mut self, _scale: f64, _rng: &mut StdRng) -> Result<(), ChainError> {
        Ok(())
    }

    fn parameters(&self) -> Option<&Tensor> {
        None
    }

    /// Gradient of the objective with respect to `parameters()`, valid after a
    /// backward pass on the current sample.
    fn param_grad(&self) -> Option<&Tensor> {
        None
    }

    /// Replaces the parameters with `values`, which must have the same shape.
    fn set_parameters(&mut self, _values: Tensor) -> Result<(), ChainError> {
        Err(ChainError::NoParameters {
            module: self.name().to_string(),
        })
    }

    /// Drops the stored parameter gradient.
    fn clear_grad(&mut self) {}
}

/// Checks that `input` is the `(dim, 1)` column a module expects.
pub(crate) fn check_input(module: &str, input: &Tensor, dim: usize) -> Result<(), ChainError> {
    if input.shape() != (dim, 1) {
        return Err(ChainError::ShapeMismatch {
            expected: (dim, 1),
            actual: input.shape(),
            operation: format!("{} forward", module),
        });
    }
    Ok(())
}

/// Checks the three columns a module's `backward` reads against its
/// declared dimensions.
pub(crate) fn check_context(
    module: &str,
    ctx: &BackwardContext<'_>,
    dim_in: usize,
    dim_out: usize,
) -> Result<(), ChainError> {
    for (t, dim) in [
        (ctx.input, dim_in),
        (ctx.output, dim_out),
        (ctx.output_grad, dim_out),
    ] {
        if t.shape() != (dim, 1) {
            return Err(ChainError::ShapeMismatch {
                expected: (dim, 1),
                actual: t.shape(),
                operation: format!("{} backward", module),
            });
        }
    }
    Ok(())
}

/// Shared body of `Module::set_parameters` for parametric modules.
pub(crate) fn replace_parameters(
    module: &str,
    slot: &mut Tensor,
    values: Tensor,
) -> Result<(), ChainError> {
    if values.shape() != slot.shape() {
        return Err(ChainError::ShapeMismatch {
            expected: slot.shape(),
            actual: values.shape(),
            operation: format!("{} set_parameters", module),
        });
    }
    *slot = values;
    Ok(())
}
