// src/model/mod.rs
// Chains of modules and the builder that wires them.

pub mod chain;

pub use chain::{Chain, ChainBuilder, ModuleId};
