// src/nn/mod.rs
// Modules that can be wired into a chain: the input root, transforms and losses.

pub mod init;
pub mod input;
pub mod layers;
pub mod losses;
pub mod module; // Trait Module

// Re-export common items
pub use input::InputModule;
pub use layers::{Bias, Linear, NegExp, Rbf, Sigmoid, SoftMax};
pub use losses::{CrossEntropyLoss, EuclideanLoss, Loss, LossGradients, LossOutput};
pub use module::{BackwardContext, Module};
