// InputEmbedding — frozen linear map from raw samples to the model width
//
// Maps each electrode's window_size samples to input_embedding_size
// features: [N, C, T] → [N, C, E]. The weights keep their random
// initialization for the life of the model, so the layer reports no
// trainable parameters.

use eegformer_core::{Device, Result, Tensor};
use eegformer_nn::{prefixed, Linear, Module};

pub struct InputEmbedding {
    linear: Linear,
}

impl InputEmbedding {
    pub fn new(window_size: usize, embed_dim: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            linear: Linear::new(window_size, embed_dim, true, device)?,
        })
    }
}

impl Module for InputEmbedding {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.linear.forward(x)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.linear.parameters()
    }

    fn trainable_parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        prefixed("linear", self.linear.named_parameters())
    }
}
