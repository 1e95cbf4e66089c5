use crate::error::ChainError;
use crate::ops::check_same_shape;
use crate::tensor::Tensor;

pub fn map<F>(a: &Tensor, f: F) -> Tensor
where
    F: Fn(f64) -> f64,
{
    Tensor::from_raw(a.data().iter().map(|&x| f(x)).collect(), a.shape())
}

/// Applies `f` pairwise to two same-shaped tensors.
pub fn zip_map<F>(a: &Tensor, b: &Tensor, f: F) -> Result<Tensor, ChainError>
where
    F: Fn(f64, f64) -> f64,
{
    check_same_shape(a, b, "zip_map")?;
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| f(x, y))
        .collect();
    Ok(Tensor::from_raw(data, a.shape()))
}

pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, ChainError> {
    check_same_shape(a, b, "add")?;
    zip_map(a, b, |x, y| x + y)
}

pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, ChainError> {
    check_same_shape(a, b, "sub")?;
    zip_map(a, b, |x, y| x - y)
}

/// Hadamard product.
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, ChainError> {
    check_same_shape(a, b, "mul")?;
    zip_map(a, b, |x, y| x * y)
}
