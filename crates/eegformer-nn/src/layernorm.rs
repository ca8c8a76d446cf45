// LayerNorm — normalization over the last dimension
//
// FORMULA:
//   y = (x - mean(x)) / sqrt(var(x) + ε) * γ + β
//
// mean and (biased) var are taken over the last dim, so for the encoder's
// [N, L, E] sequences every position is normalized over its E features.
//
// SHAPES:
//   Input / output: [*, D]
//   γ, β:           [D]

use eegformer_core::{Device, Error, Result, Tensor};

use crate::module::Module;

/// Layer Normalization over the last dimension.
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    normalized_size: usize,
    eps: f64,
}

impl LayerNorm {
    pub fn new(normalized_size: usize, eps: f64, device: &Device) -> Result<Self> {
        Ok(LayerNorm {
            weight: Tensor::ones(normalized_size, device)?,
            bias: Tensor::zeros(normalized_size, device)?,
            normalized_size,
            eps,
        })
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn normalized_size(&self) -> usize {
        self.normalized_size
    }
}

impl Module for LayerNorm {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let rank = x.rank();
        if rank == 0 || x.dims()[rank - 1] != self.normalized_size {
            return Err(Error::msg(format!(
                "LayerNorm: expected last dim {}, got shape {}",
                self.normalized_size,
                x.shape()
            )));
        }
        let last_dim = rank - 1;

        let mu = x.mean(last_dim, true)?;
        let centered = x.sub(&mu)?;
        let variance = centered.square()?.mean(last_dim, true)?;
        let std = variance.affine(1.0, self.eps)?.sqrt()?;

        centered.div(&std)?.mul(&self.weight)?.add(&self.bias)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("bias".to_string(), self.bias.clone()),
        ]
    }
}
