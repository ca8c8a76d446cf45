//! # eegformer-nn
//!
//! Layers for the EEG transformer, each implementing the [`Module`] trait:
//!
//! 1. **Conv2d / AvgPool2d** — temporal and spatial filtering of EEG planes
//! 2. **BatchNorm2d / LayerNorm** — normalization
//! 3. **Linear** — fully connected: `y = xW^T + b`
//! 4. **MultiHeadAttention** — packed-projection self-attention
//! 5. **Dropout / SiLU / Flatten** — stateless glue
//! 6. **Sequential** — chains modules
//!
//! Every constructor takes an explicit `&Device`.

pub mod activation;
pub mod attention;
pub mod batchnorm;
pub mod conv;
pub mod dropout;
pub mod flatten;
pub mod init;
pub mod layernorm;
pub mod linear;
pub mod module;
pub mod sequential;

pub use activation::SiLU;
pub use attention::MultiHeadAttention;
pub use batchnorm::BatchNorm2d;
pub use conv::{AvgPool2d, Conv2d};
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use layernorm::LayerNorm;
pub use linear::Linear;
pub use module::{prefixed, Module};
pub use sequential::Sequential;
