// PositionalEncoding — fixed sinusoidal table
//
//   pe[p, 2i]   = sin(p · 10000^(-2i/E))
//   pe[p, 2i+1] = cos(p · 10000^(-2i/E))
//
// stored as [1, max_len, E] and added to the first S positions of an
// [N, S, E] input. Nothing here is learned.

use eegformer_core::{Device, Error, Result, Tensor};
use eegformer_nn::Module;

pub struct PositionalEncoding {
    table: Tensor,
    max_len: usize,
    d_model: usize,
}

impl PositionalEncoding {
    pub fn new(max_len: usize, d_model: usize, device: &Device) -> Result<Self> {
        let ln_base = 10000f64.ln();
        let mut data = vec![0.0f32; max_len * d_model];
        for (p, row) in data.chunks_mut(d_model.max(1)).enumerate().take(max_len) {
            for (i, v) in row.iter_mut().enumerate() {
                let pair = (i / 2 * 2) as f64;
                let angle = p as f64 * (-pair * ln_base / d_model as f64).exp();
                *v = if i % 2 == 0 { angle.sin() } else { angle.cos() } as f32;
            }
        }
        Ok(Self {
            table: Tensor::from_vec(data, (1, max_len, d_model), device)?,
            max_len,
            d_model,
        })
    }

    /// The `[1, max_len, E]` table.
    pub fn table(&self) -> &Tensor {
        &self.table
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// `x + table[:, :S]` for `x` of shape `[N, S, E]`, on `x`'s device.
    pub fn apply(&self, x: &Tensor) -> Result<Tensor> {
        let (_, seq, width) = x.shape().dims3()?;
        if width != self.d_model || seq > self.max_len {
            return Err(Error::msg(format!(
                "positional encoding covers {} positions of width {}, got input {}",
                self.max_len,
                self.d_model,
                x.shape()
            )));
        }
        let pe = self.table.narrow(1, 0, seq)?.to_device(x.device())?;
        x.add(&pe)
    }
}

impl Module for PositionalEncoding {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.apply(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}
