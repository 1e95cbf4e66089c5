// src/nn/layers/mod.rs
// Interior transform modules (everything between the input and the loss).

pub mod bias;
pub mod linear;
pub mod neg_exp;
pub mod rbf;
pub mod sigmoid;
pub mod softmax;

// Re-export key layer structs
pub use bias::Bias;
pub use linear::Linear;
pub use neg_exp::NegExp;
pub use rbf::Rbf;
pub use sigmoid::Sigmoid;
pub use softmax::SoftMax;
