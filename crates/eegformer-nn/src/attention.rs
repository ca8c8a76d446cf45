// Multi-Head Attention — scaled dot-product self-attention over h heads
//
// MATHEMATICS:
//
//   Input: x of shape [batch, seq, d_model] (after layout normalization)
//
//   1. [Q | K | V] = x @ W_in^T + b_in          W_in: [3·d_model, d_model]
//   2. Split to heads: [batch, seq, h, d_head] → [batch, h, seq, d_head]
//   3. scores  = Q @ K^T / √d_head               [batch, h, seq, seq]
//      weights = softmax(scores, dim=-1)
//      out     = weights @ V                     [batch, h, seq, d_head]
//   4. Merge heads → [batch, seq, d_model], then out @ W_out^T + b_out
//
// LAYOUT:
//
//   With `batch_first = false` (the PyTorch default) the input is read as
//   [seq, batch, d_model]: attention runs along axis 0 and axis 1 is the
//   batch. With `batch_first = true` it is read as [batch, seq, d_model].
//   Output always has the same layout as the input.
//
// INITIALIZATION:
//
//   W_in is xavier-uniform over the packed [3·d_model, d_model] matrix, both
//   biases start at zero, W_out uses the Linear default.

use eegformer_core::{Device, Error, Result, Tensor};
use tracing::trace;

use crate::init;
use crate::linear::Linear;
use crate::module::{prefixed, Module};

/// Multi-Head Self-Attention with packed input projection.
///
/// # Examples
/// ```
/// use eegformer_core::{Device, Tensor};
/// use eegformer_nn::{Module, MultiHeadAttention};
///
/// let attn = MultiHeadAttention::new(40, 4, &Device::Cpu)?.with_batch_first(true);
/// let x = Tensor::rand((2, 72, 40), &Device::Cpu)?;
/// assert_eq!(attn.forward(&x)?.dims(), &[2, 72, 40]);
/// # Ok::<(), eegformer_core::Error>(())
/// ```
pub struct MultiHeadAttention {
    num_heads: usize,
    head_dim: usize,
    d_model: usize,
    in_proj: Linear,
    out_proj: Linear,
    scale: f64,
    batch_first: bool,
}

impl MultiHeadAttention {
    /// `d_model` must be divisible by `num_heads`.
    pub fn new(d_model: usize, num_heads: usize, device: &Device) -> Result<Self> {
        if num_heads == 0 || d_model % num_heads != 0 {
            return Err(Error::msg(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                d_model, num_heads
            )));
        }
        let head_dim = d_model / num_heads;

        let in_proj = Linear::from_tensors(
            init::xavier_uniform((3 * d_model, d_model), 1.0, device)?,
            Some(Tensor::zeros(3 * d_model, device)?),
        )?;
        let out_weight = Linear::new(d_model, d_model, false, device)?.weight().clone();
        let out_proj = Linear::from_tensors(out_weight, Some(Tensor::zeros(d_model, device)?))?;

        Ok(MultiHeadAttention {
            num_heads,
            head_dim,
            d_model,
            in_proj,
            out_proj,
            scale: 1.0 / (head_dim as f64).sqrt(),
            batch_first: false,
        })
    }

    /// Read inputs as `[batch, seq, d_model]` instead of `[seq, batch, d_model]`.
    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    pub fn batch_first(&self) -> bool {
        self.batch_first
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub fn d_model(&self) -> usize {
        self.d_model
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// [batch, seq, d_model] → [batch, h, seq, d_head]
    fn split_heads(&self, x: &Tensor, batch: usize, seq: usize) -> Result<Tensor> {
        x.reshape((batch, seq, self.num_heads, self.head_dim))?
            .permute(&[0, 2, 1, 3])
    }

    /// Self-attention returning the output and the head-averaged attention
    /// weights `[batch, seq, seq]` (batch/seq as read in this module's layout).
    pub fn forward_with_weights(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let (d0, d1, d_model) = x.shape().dims3()?;
        if d_model != self.d_model {
            return Err(Error::msg(format!(
                "MultiHeadAttention: expected width {}, got shape {}",
                self.d_model,
                x.shape()
            )));
        }

        let x_bsd = if self.batch_first {
            x.clone()
        } else {
            x.transpose(0, 1)?
        };
        let (batch, seq) = if self.batch_first { (d0, d1) } else { (d1, d0) };
        trace!(batch, seq, heads = self.num_heads, "self-attention");

        let qkv = self.in_proj.forward(&x_bsd)?;
        let q = self.split_heads(&qkv.narrow(2, 0, self.d_model)?, batch, seq)?;
        let k = self.split_heads(&qkv.narrow(2, self.d_model, self.d_model)?, batch, seq)?;
        let v = self.split_heads(&qkv.narrow(2, 2 * self.d_model, self.d_model)?, batch, seq)?;

        let scores = q.matmul(&k.t()?)?.affine(self.scale, 0.0)?;
        let weights = scores.softmax(3)?;
        let context = weights
            .matmul(&v)?
            .permute(&[0, 2, 1, 3])?
            .reshape((batch, seq, self.d_model))?;

        let out = self.out_proj.forward(&context)?;
        let out = if self.batch_first {
            out
        } else {
            out.transpose(0, 1)?
        };
        Ok((out, weights.mean(1, false)?))
    }
}

impl Module for MultiHeadAttention {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.forward_with_weights(x)?.0)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.in_proj.parameters();
        params.extend(self.out_proj.parameters());
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = prefixed("in_proj", self.in_proj.named_parameters());
        named.extend(prefixed("out_proj", self.out_proj.named_parameters()));
        named
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heads_must_divide_width() {
        assert!(MultiHeadAttention::new(40, 3, &Device::Cpu).is_err());
        assert!(MultiHeadAttention::new(40, 0, &Device::Cpu).is_err());
    }

    #[test]
    fn weights_are_row_stochastic() {
        let dev = Device::Cpu;
        let attn = MultiHeadAttention::new(8, 2, &dev).unwrap().with_batch_first(true);
        let x = Tensor::randn((3, 5, 8), &dev).unwrap();
        let (out, weights) = attn.forward_with_weights(&x).unwrap();
        assert_eq!(out.dims(), &[3, 5, 8]);
        assert_eq!(weights.dims(), &[3, 5, 5]);
        for s in weights.sum(2, false).unwrap().to_vec() {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sequence_first_mixes_along_axis_zero() {
        let dev = Device::Cpu;
        let attn = MultiHeadAttention::new(8, 2, &dev).unwrap();
        let x = Tensor::randn((4, 6, 8), &dev).unwrap();
        let (out, weights) = attn.forward_with_weights(&x).unwrap();
        assert_eq!(out.dims(), &[4, 6, 8]);
        // six independent problems, each attending across the four rows of axis 0
        assert_eq!(weights.dims(), &[6, 4, 4]);
    }

    #[test]
    fn parameter_count_matches_packed_layout() {
        let attn = MultiHeadAttention::new(40, 4, &Device::Cpu).unwrap();
        assert_eq!(attn.num_parameters(), 3 * 40 * 40 + 3 * 40 + 40 * 40 + 40);
    }
}
