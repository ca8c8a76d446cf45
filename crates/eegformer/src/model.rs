// EegTransformer — the full classifier
//
//   windows [N, 1, C, T]
//     → TemporalConvFeaturizer     [N, L, E]
//     → AttentionEncoderStack      [N, L, E]
//     → ClassificationHead         [N, num_classes]   (mean over L inside)
//
// DORMANT INPUT PATH:
//
// The frozen InputEmbedding and the PositionalEncoding are constructed with
// the model and counted in `parameters()`, but `forward()` never touches
// them. `embed_input()` runs them on their own: [N, C, T] → [N, C, E].

use eegformer_core::{Device, Result, Tensor};
use eegformer_nn::{prefixed, Module};
use tracing::debug;

use crate::config::EegTransformerConfig;
use crate::embedding::InputEmbedding;
use crate::encoder::AttentionEncoderStack;
use crate::featurizer::TemporalConvFeaturizer;
use crate::head::ClassificationHead;
use crate::positional::PositionalEncoding;

pub struct EegTransformer {
    config: EegTransformerConfig,
    featurizer: TemporalConvFeaturizer,
    encoder: AttentionEncoderStack,
    head: ClassificationHead,
    input_embedding: InputEmbedding,
    positional: PositionalEncoding,
    device: Device,
}

impl EegTransformer {
    pub fn new(config: EegTransformerConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let e = config.input_embedding_size;

        let featurizer = TemporalConvFeaturizer::new(
            &config.featurizer,
            config.num_channels,
            config.window_size,
            e,
            config.dropout,
            device,
        )?;
        let encoder = AttentionEncoderStack::new(&config, device)?;
        let head = ClassificationHead::new(e, config.num_classes, config.layer_norm_eps, device)?;
        let input_embedding = InputEmbedding::new(config.window_size, e, device)?;
        let positional = PositionalEncoding::new(config.num_channels, e, device)?;

        let model = Self {
            config,
            featurizer,
            encoder,
            head,
            input_embedding,
            positional,
            device: *device,
        };
        debug!(
            parameters = model.num_parameters(),
            trainable = model.trainable_params_count(),
            sequence_length = model.sequence_length(),
            layers = model.config.num_layers,
            device = %model.device,
            "built eeg transformer"
        );
        Ok(model)
    }

    pub fn config(&self) -> &EegTransformerConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Embeddings per window produced by the featurizer.
    pub fn sequence_length(&self) -> usize {
        self.featurizer.sequence_length()
    }

    pub fn featurizer(&self) -> &TemporalConvFeaturizer {
        &self.featurizer
    }

    pub fn encoder(&self) -> &AttentionEncoderStack {
        &self.encoder
    }

    pub fn head(&self) -> &ClassificationHead {
        &self.head
    }

    pub fn positional(&self) -> &PositionalEncoding {
        &self.positional
    }

    /// Featurizer + encoder output before pooling, `[N, L, E]`.
    pub fn encode(&self, x: &Tensor) -> Result<Tensor> {
        let seq = self.featurizer.forward(x)?;
        self.encoder.forward(&seq)
    }

    /// Arg-max class per window.
    pub fn predict(&self, x: &Tensor) -> Result<Vec<usize>> {
        self.forward(x)?.argmax(1)
    }

    /// Frozen embedding plus positional table on raw `[N, C, T]` windows.
    pub fn embed_input(&self, x: &Tensor) -> Result<Tensor> {
        let x = if x.rank() == 4 { x.squeeze(1)? } else { x.clone() };
        let embedded = self.input_embedding.forward(&x)?;
        self.positional.apply(&embedded)
    }
}

impl Module for EegTransformer {
    /// `[N, C, T]` or `[N, 1, C, T]` → raw logits `[N, num_classes]`.
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.head.forward(&self.encode(x)?)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    fn trainable_parameters(&self) -> Vec<Tensor> {
        let mut params = self.featurizer.trainable_parameters();
        params.extend(self.encoder.trainable_parameters());
        params.extend(self.head.trainable_parameters());
        params.extend(self.input_embedding.trainable_parameters());
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = prefixed("featurizer", self.featurizer.named_parameters());
        named.extend(prefixed("encoder", self.encoder.named_parameters()));
        named.extend(prefixed("head", self.head.named_parameters()));
        named.extend(prefixed("input_embedding", self.input_embedding.named_parameters()));
        named
    }

    fn set_training(&self, training: bool) {
        self.featurizer.set_training(training);
        self.encoder.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.featurizer.is_training()
    }
}
