use crate::error::ChainError;
use crate::tensor::Tensor;

/// The root of a chain: holds the current `(x, y)` sample.
///
/// Forward traversal stops here without computing anything and backward
/// traversal passes straight through. Samples are installed from outside
/// with [`InputModule::set_sample`]; sampling order is not this module's
/// concern.
#[derive(Debug, Clone)]
pub struct InputModule {
    dim_x: usize,
    dim_y: usize,
    x: Option<Tensor>,
    y: Option<Tensor>,
}

impl InputModule {
    /// # Errors
    /// Returns `ChainError::InvalidDimension` if either dimension is zero.
    pub fn new(dim_x: usize, dim_y: usize) -> Result<Self, ChainError> {
        if dim_x == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Input".to_string(),
                dim: "dim_x",
            });
        }
        if dim_y == 0 {
            return Err(ChainError::InvalidDimension {
                module: "Input".to_string(),
                dim: "dim_y",
            });
        }
        Ok(InputModule {
            dim_x,
            dim_y,
            x: None,
            y: None,
        })
    }

    pub fn dim_x(&self) -> usize {
        self.dim_x
    }

    pub fn dim_y(&self) -> usize {
        self.dim_y
    }

    /// Installs a new sample. Both vectors may be given as rows or columns;
    /// they are stored as columns.
    ///
    /// # Errors
    /// Returns `ChainError::SampleLength` if a vector has the wrong number of
    /// elements and `ChainError::ShapeMismatch` if it is not a vector at all.
    pub fn set_sample(&mut self, x: Tensor, y: Tensor) -> Result<(), ChainError> {
        let x = as_column(x, self.dim_x, "x")?;
        let y = as_column(y, self.dim_y, "y")?;
        self.x = Some(x);
        self.y = Some(y);
        Ok(())
    }

    pub fn x(&self) -> Result<&Tensor, ChainError> {
        self.x
            .as_ref()
            .ok_or_else(|| ChainError::InvalidState("no sample installed".to_string()))
    }

    pub fn y(&self) -> Result<&Tensor, ChainError> {
        self.y
            .as_ref()
            .ok_or_else(|| ChainError::InvalidState("no sample installed".to_string()))
    }
}

fn as_column(t: Tensor, dim: usize, which: &'static str) -> Result<Tensor, ChainError> {
    let (rows, cols) = t.shape();
    if rows != 1 && cols != 1 {
        return Err(ChainError::ShapeMismatch {
            expected: (dim, 1),
            actual: (rows, cols),
            operation: format!("set_sample ({})", which),
        });
    }
    if t.numel() != dim {
        return Err(ChainError::SampleLength {
            which,
            expected: dim,
            actual: t.numel(),
        });
    }
    Tensor::new(t.into_vec(), (dim, 1))
}
