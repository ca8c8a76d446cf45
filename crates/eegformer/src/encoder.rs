// AttentionEncoderStack — num_layers independently parameterized blocks
//
// One block on input x (shape [N, L, E]):
//
//   a = MultiHeadAttention(x, x, x)
//   h = norm1(residual(x, a))          see ResidualDropout for the wiring
//   f = linear2(linear1(h))            no activation between the two maps
//   y = norm2(residual(h, f))
//   out = silu(y)
//
// Blocks are chained; there are no skip connections across blocks.

use eegformer_core::{Device, Result, Tensor};
use eegformer_nn::{prefixed, Dropout, LayerNorm, Linear, Module, MultiHeadAttention};

use crate::config::{AttentionAxis, EegTransformerConfig, ResidualDropout};

/// A single self-attention block.
pub struct AttentionBlock {
    attention: MultiHeadAttention,
    norm1: LayerNorm,
    norm2: LayerNorm,
    linear1: Linear,
    linear2: Linear,
    dropout: Dropout,
    residual: ResidualDropout,
}

impl AttentionBlock {
    pub fn new(config: &EegTransformerConfig, device: &Device) -> Result<Self> {
        let e = config.input_embedding_size;
        let attention = MultiHeadAttention::new(e, config.num_heads, device)?
            .with_batch_first(config.attention_axis == AttentionAxis::Sequence);
        Ok(Self {
            attention,
            norm1: LayerNorm::new(e, config.layer_norm_eps, device)?,
            norm2: LayerNorm::new(e, config.layer_norm_eps, device)?,
            linear1: Linear::new(e, config.hidden_size, true, device)?,
            linear2: Linear::new(config.hidden_size, e, true, device)?,
            dropout: Dropout::new(config.dropout)?,
            residual: config.residual_dropout,
        })
    }

    pub fn residual_dropout(&self) -> ResidualDropout {
        self.residual
    }
}

impl Module for AttentionBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let a = self.attention.forward(x)?;
        let h = match self.residual {
            ResidualDropout::Faithful => x.add(&self.dropout.forward(&a)?)?.add(&a)?,
            ResidualDropout::Bypassed => x.add(&a)?,
            ResidualDropout::Corrected => x.add(&self.dropout.forward(&a)?)?,
        };
        let h = self.norm1.forward(&h)?;

        let f = self.linear2.forward(&self.linear1.forward(&h)?)?;
        let y = match self.residual {
            ResidualDropout::Bypassed => h.add(&f)?,
            ResidualDropout::Faithful | ResidualDropout::Corrected => {
                h.add(&self.dropout.forward(&f)?)?
            }
        };
        self.norm2.forward(&y)?.silu()
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = prefixed("attention", self.attention.named_parameters());
        named.extend(prefixed("norm1", self.norm1.named_parameters()));
        named.extend(prefixed("norm2", self.norm2.named_parameters()));
        named.extend(prefixed("linear1", self.linear1.named_parameters()));
        named.extend(prefixed("linear2", self.linear2.named_parameters()));
        named
    }

    fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.dropout.is_training()
    }
}

/// `num_layers` attention blocks applied in sequence; shape-preserving.
pub struct AttentionEncoderStack {
    blocks: Vec<AttentionBlock>,
}

impl AttentionEncoderStack {
    pub fn new(config: &EegTransformerConfig, device: &Device) -> Result<Self> {
        let blocks = (0..config.num_layers)
            .map(|_| AttentionBlock::new(config, device))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { blocks })
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[AttentionBlock] {
        &self.blocks
    }
}

impl Module for AttentionEncoderStack {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.blocks
            .iter()
            .try_fold(x.clone(), |h, block| block.forward(&h))
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.blocks.iter().flat_map(|b| b.parameters()).collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| prefixed(&format!("layers.{i}"), b.named_parameters()))
            .collect()
    }

    fn set_training(&self, training: bool) {
        for block in &self.blocks {
            block.set_training(training);
        }
    }

    fn is_training(&self) -> bool {
        self.blocks.iter().all(|b| b.is_training())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(got: &[f32], expected: &[f32]) {
        assert_eq!(got.len(), expected.len());
        for (i, (g, e)) in got.iter().zip(expected).enumerate() {
            assert!((g - e).abs() < 1e-5, "index {}: got {} expected {}", i, g, e);
        }
    }

    #[test]
    fn faithful_block_adds_attention_twice() {
        let dev = Device::Cpu;
        let block = AttentionBlock::new(&EegTransformerConfig::default(), &dev).unwrap();
        assert_eq!(block.residual_dropout(), ResidualDropout::Faithful);
        block.eval();
        let x = Tensor::randn((3, 6, 40), &dev).unwrap();

        let a = block.attention.forward(&x).unwrap();
        let h = block.norm1.forward(&x.add(&a.affine(2.0, 0.0).unwrap()).unwrap()).unwrap();
        let f = block
            .linear2
            .forward(&block.linear1.forward(&h).unwrap())
            .unwrap();
        let expected = block
            .norm2
            .forward(&h.add(&f).unwrap())
            .unwrap()
            .silu()
            .unwrap();

        let got = block.forward(&x).unwrap();
        assert_eq!(got.dims(), &[3, 6, 40]);
        assert_close(got.as_slice(), expected.as_slice());
    }

    #[test]
    fn faithful_and_corrected_differ_with_shared_weights() {
        let dev = Device::Cpu;
        let mut block = AttentionBlock::new(&EegTransformerConfig::default(), &dev).unwrap();
        block.eval();
        let x = Tensor::randn((2, 5, 40), &dev).unwrap();

        let faithful = block.forward(&x).unwrap();
        block.residual = ResidualDropout::Corrected;
        let corrected = block.forward(&x).unwrap();
        block.residual = ResidualDropout::Bypassed;
        let bypassed = block.forward(&x).unwrap();

        assert!(faithful
            .as_slice()
            .iter()
            .zip(corrected.as_slice())
            .any(|(f, c)| (f - c).abs() > 1e-4));
        // dropout is the identity in eval, so these two wirings coincide
        assert_eq!(corrected.as_slice(), bypassed.as_slice());
    }
}
