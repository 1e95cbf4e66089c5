// src/autograd/mod.rs
// Finite-difference verification of the analytic gradients a chain produces.

pub mod grad_check;

pub use grad_check::{GradCheck, GradCheckError, GradCheckReport, GradientComparison, Quantity};
