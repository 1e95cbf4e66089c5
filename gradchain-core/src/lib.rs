//! Reverse-mode backpropagation through linear chains of modules, with a
//! central finite-difference harness that checks every analytic gradient.

pub mod autograd;
pub mod error;
pub mod model;
pub mod nn;
pub mod ops;
pub mod tensor;
pub mod utils;

// Re-exported so collaborators can reach the common types from the crate root.
pub use error::ChainError;
pub use model::{Chain, ChainBuilder, ModuleId};
pub use tensor::Tensor;
