// Flatten — collapse trailing dimensions into one
//
// The featurizer ends with [N, E, 1, L] feature maps and flattens from dim 2
// to get [N, E, L] before handing a sequence to the encoder.

use eegformer_core::{Result, Tensor};

use crate::module::Module;

/// Collapses dimensions `start_dim..` into one.
///
/// # Examples
/// ```
/// use eegformer_core::{Device, Tensor};
/// use eegformer_nn::{Flatten, Module};
///
/// let x = Tensor::zeros((8, 40, 1, 72), &Device::Cpu)?;
/// assert_eq!(Flatten::new(2).forward(&x)?.dims(), &[8, 40, 72]);
/// # Ok::<(), eegformer_core::Error>(())
/// ```
pub struct Flatten {
    start_dim: usize,
}

impl Flatten {
    pub fn new(start_dim: usize) -> Self {
        Flatten { start_dim }
    }

    pub fn start_dim(&self) -> usize {
        self.start_dim
    }
}

impl Default for Flatten {
    /// Flatten everything except the batch dimension.
    fn default() -> Self {
        Flatten { start_dim: 1 }
    }
}

impl Module for Flatten {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if self.start_dim + 1 >= x.rank() {
            return Ok(x.clone());
        }
        x.flatten(self.start_dim, x.rank() - 1)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}
