//! # eegformer-core
//!
//! Tensor foundation for the eegformer workspace.
//!
//! - [`Shape`]: dimension sizes, strides, broadcasting
//! - [`Device`]: where storage lives, passed explicitly to every allocation
//! - [`Tensor`]: contiguous f32 n-dimensional array with the ops the EEG
//!   model needs (broadcast arithmetic, reductions, matmul, conv2d, pooling)
//! - [`Error`] / [`Result`]: the error type every fallible op returns

pub mod device;
pub mod error;
pub mod shape;
pub mod tensor;

pub use device::Device;
pub use error::{Error, Result};
pub use shape::Shape;
pub use tensor::Tensor;
