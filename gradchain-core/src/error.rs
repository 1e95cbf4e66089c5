use thiserror::Error;

/// Custom error type for module chains.
///
/// Configuration errors are raised while a chain is being built or fed,
/// shape-contract violations right after a `backward()` hook, and domain
/// errors while evaluating a single sample.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum ChainError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
        operation: String,
    },

    #[error("Cannot connect {successor} after {predecessor}: expected dim_in {expected}, got {actual}")]
    DimensionMismatch {
        predecessor: String,
        successor: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid dimension for {module}: {dim} must be positive")]
    InvalidDimension { module: String, dim: &'static str },

    #[error("Malformed template matrix: {reason}")]
    InvalidTemplates { reason: String },

    #[error("Invalid initialization scale {scale}: must be finite and non-negative")]
    InvalidScale { scale: f64 },

    #[error("Loss {module} expects a target of dimension {expected}, but the input holds dim_y = {actual}")]
    TargetDimensionMismatch {
        module: String,
        expected: usize,
        actual: usize,
    },

    #[error("Sample {which} has {actual} elements, expected {expected}")]
    SampleLength {
        which: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError {
        data_len: usize,
        shape: (usize, usize),
    },

    #[error("Module {module} has no parameters")]
    NoParameters { module: String },

    #[error("No module at position {0}")]
    UnknownModule(usize),

    #[error("Shape contract violated by {module}: {what} should be {expected:?}, got {actual:?}")]
    ShapeContract {
        module: String,
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Domain error in {module} at sample {sample}: {reason}")]
    Domain {
        module: String,
        sample: usize,
        reason: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ChainError {
    /// Builds a domain error; the sample index is filled in by the chain.
    pub fn domain(module: &str, reason: impl Into<String>) -> Self {
        ChainError::Domain {
            module: module.to_string(),
            sample: 0,
            reason: reason.into(),
        }
    }

    /// Attaches the chain's current sample index to a domain error.
    pub fn at_sample(self, index: usize) -> Self {
        match self {
            ChainError::Domain { module, reason, .. } => ChainError::Domain {
                module,
                sample: index,
                reason,
            },
            other => other,
        }
    }
}
