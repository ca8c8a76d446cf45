use eegformer_core::{Device, Result, Tensor};
use eegformer_nn::{LayerNorm, Linear, Module, Sequential};

/// Mean over the sequence axis, then LayerNorm and a linear map to raw
/// class logits: `[N, L, E]` → `[N, num_classes]`.
pub struct ClassificationHead {
    layers: Sequential,
    num_classes: usize,
}

impl ClassificationHead {
    pub fn new(embed_dim: usize, num_classes: usize, eps: f64, device: &Device) -> Result<Self> {
        let layers = Sequential::new()
            .add(LayerNorm::new(embed_dim, eps, device)?)
            .add(Linear::new(embed_dim, num_classes, true, device)?);
        Ok(Self {
            layers,
            num_classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl Module for ClassificationHead {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.layers.forward(&x.mean(1, false)?)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.layers.parameters()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.layers.named_parameters()
    }
}
