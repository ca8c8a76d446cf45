// TemporalConvFeaturizer — EEG window → embedding sequence
//
// PIPELINE (canonical sizes for 22 electrodes × 1125 samples, E = 40):
//
//   [N, 1, 22, 1125]
//     Conv2d 1→40, (1×20)        filter each electrode over time
//     BatchNorm2d + SiLU
//   [N, 40, 22, 1106]
//     Conv2d 40→40, (22×1)       mix electrodes, collapse the electrode axis
//     BatchNorm2d + SiLU
//   [N, 40, 1, 1106]
//     AvgPool2d (1×30) stride (1×15)
//     Dropout
//   [N, 40, 1, 72]
//     Conv2d 40→E, (1×1)         project to the model width
//   [N, E, 1, 72] → flatten → [N, E, 72] → transpose → [N, 72, E]
//
// The sequence length depends only on the window size and the kernel/pool
// geometry; it is computed once at construction.

use eegformer_core::{Device, Error, Result, Shape, Tensor};
use eegformer_nn::{
    prefixed, AvgPool2d, BatchNorm2d, Conv2d, Dropout, Flatten, Module, SiLU,
};
use tracing::trace;

use crate::config::FeaturizerConfig;

pub struct TemporalConvFeaturizer {
    temporal_conv: Conv2d,
    temporal_norm: BatchNorm2d,
    spatial_conv: Conv2d,
    spatial_norm: BatchNorm2d,
    activation: SiLU,
    pool: AvgPool2d,
    dropout: Dropout,
    projection: Conv2d,
    flatten: Flatten,
    num_channels: usize,
    window_size: usize,
    embed_dim: usize,
    sequence_length: usize,
}

impl TemporalConvFeaturizer {
    pub fn new(
        config: &FeaturizerConfig,
        num_channels: usize,
        window_size: usize,
        embed_dim: usize,
        dropout: f64,
        device: &Device,
    ) -> Result<Self> {
        config.validate(window_size)?;
        let sequence_length = config
            .sequence_length(window_size)
            .ok_or_else(|| Error::msg("featurizer kernels do not fit the window"))?;

        let FeaturizerConfig {
            temporal_filters,
            temporal_kernel,
            spatial_filters,
            pool_kernel,
            pool_stride,
            batch_norm_eps,
            batch_norm_momentum,
        } = *config;

        Ok(Self {
            temporal_conv: Conv2d::new(
                1,
                temporal_filters,
                [1, temporal_kernel],
                [1, 1],
                [0, 0],
                true,
                device,
            )?,
            temporal_norm: BatchNorm2d::new(
                temporal_filters,
                batch_norm_eps,
                batch_norm_momentum,
                device,
            )?,
            spatial_conv: Conv2d::new(
                temporal_filters,
                spatial_filters,
                [num_channels, 1],
                [1, 1],
                [0, 0],
                true,
                device,
            )?,
            spatial_norm: BatchNorm2d::new(
                spatial_filters,
                batch_norm_eps,
                batch_norm_momentum,
                device,
            )?,
            activation: SiLU,
            pool: AvgPool2d::new([1, pool_kernel], [1, pool_stride], [0, 0]),
            dropout: Dropout::new(dropout)?,
            projection: Conv2d::new(spatial_filters, embed_dim, [1, 1], [1, 1], [0, 0], true, device)?,
            flatten: Flatten::new(2),
            num_channels,
            window_size,
            embed_dim,
            sequence_length,
        })
    }

    /// L, the number of embeddings per window.
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl Module for TemporalConvFeaturizer {
    /// `[N, 1, C, T]` (or `[N, C, T]`) → `[N, L, E]`.
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = if x.rank() == 3 { x.unsqueeze(1)? } else { x.clone() };
        let (n, planes, c, t) = x.shape().dims4()?;
        if planes != 1 || c != self.num_channels || t != self.window_size {
            return Err(Error::ShapeMismatch {
                expected: Shape::from((n, 1, self.num_channels, self.window_size)),
                got: x.shape().clone(),
            });
        }

        let h = self.temporal_conv.forward(&x)?;
        let h = self.activation.forward(&self.temporal_norm.forward(&h)?)?;
        let h = self.spatial_conv.forward(&h)?;
        let h = self.activation.forward(&self.spatial_norm.forward(&h)?)?;
        let h = self.dropout.forward(&self.pool.forward(&h)?)?;
        let h = self.projection.forward(&h)?;
        trace!(shape = %h.shape(), "featurizer maps");

        self.flatten.forward(&h)?.transpose(1, 2)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = prefixed("temporal_conv", self.temporal_conv.named_parameters());
        named.extend(prefixed("temporal_norm", self.temporal_norm.named_parameters()));
        named.extend(prefixed("spatial_conv", self.spatial_conv.named_parameters()));
        named.extend(prefixed("spatial_norm", self.spatial_norm.named_parameters()));
        named.extend(prefixed("projection", self.projection.named_parameters()));
        named
    }

    fn set_training(&self, training: bool) {
        self.temporal_norm.set_training(training);
        self.spatial_norm.set_training(training);
        self.dropout.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.dropout.is_training()
    }
}
