use crate::error::ChainError;
use crate::tensor::{rand_uniform, Tensor};
use rand::Rng;

/// Half-width of the fan-in scaled uniform initialization: `scale / sqrt(fan_in)`.
pub fn fan_in_bound(fan_in: usize, scale: f64) -> f64 {
    scale / (fan_in as f64).sqrt()
}

/// A fan-in scale must be finite and non-negative.
pub fn check_scale(scale: f64) -> Result<(), ChainError> {
    if !(scale.is_finite() && scale >= 0.0) {
        return Err(ChainError::InvalidScale { scale });
    }
    Ok(())
}

/// Draws a tensor of `shape` uniformly from `[-b, b]` with
/// `b = scale / sqrt(fan_in)`.
///
/// Keeps pre-activation magnitudes independent of the input dimension.
///
/// # Errors
/// Returns `ChainError::InvalidDimension` if `fan_in` is zero and
/// `ChainError::InvalidScale` if `scale` is negative or not finite.
pub fn fan_in_uniform<R: Rng + ?Sized>(
    shape: (usize, usize),
    fan_in: usize,
    scale: f64,
    rng: &mut R,
) -> Result<Tensor, ChainError> {
    if fan_in == 0 {
        return Err(ChainError::InvalidDimension {
            module: "fan_in_uniform".to_string(),
            dim: "fan_in",
        });
    }
    check_scale(scale)?;
    let bound = fan_in_bound(fan_in, scale);
    rand_uniform(shape, -bound, bound, rng)
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
