// Activation modules — stateless element-wise functions as Module
//
// Wrapping an activation as a Module lets it sit inside a Sequential next
// to parameterized layers.

use eegformer_core::{Result, Tensor};

use crate::module::Module;

/// SiLU / Swish activation: x * σ(x)
pub struct SiLU;

impl Module for SiLU {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.silu()
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}
