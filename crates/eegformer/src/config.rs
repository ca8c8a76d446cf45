// Configuration for the EEG transformer
//
// Every architectural constant is a named field with the canonical
// motor-imagery value as its default, so a model can be rebuilt from JSON:
//
//   {"num_layers": 4, "attention_axis": "sequence"}
//
// Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};

use eegformer_core::{Error, Result};

/// How dropout enters the two residual connections of an attention block.
///
/// With attention output `a`, block input `x`, and feed-forward output `f`:
///
/// | variant     | after attention               | after feed-forward          |
/// |-------------|-------------------------------|-----------------------------|
/// | `Faithful`  | `h = norm1(x + drop(a) + a)`  | `y = norm2(h + drop(f))`    |
/// | `Bypassed`  | `h = norm1(x + a)`            | `y = norm2(h + f)`          |
/// | `Corrected` | `h = norm1(x + drop(a))`      | `y = norm2(h + drop(f))`    |
///
/// `Faithful` adds the attention output twice, once through dropout.
/// `Bypassed` never lets dropout reach the output. `Corrected` is the
/// standard post-norm transformer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualDropout {
    #[default]
    Faithful,
    Bypassed,
    Corrected,
}

/// Which axis of the featurizer's `[N, L, E]` output self-attention mixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionAxis {
    /// Sequence-first attention on a batch-first tensor: positions along
    /// axis 0 (the windows of the batch) attend to each other, separately
    /// for each of the L time steps.
    #[default]
    Batch,
    /// Each window's L time steps attend to each other.
    Sequence,
}

/// Geometry of the convolutional featurizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturizerConfig {
    /// Output channels of the (1 × temporal_kernel) convolution.
    pub temporal_filters: usize,
    pub temporal_kernel: usize,
    /// Output channels of the (num_channels × 1) convolution.
    pub spatial_filters: usize,
    pub pool_kernel: usize,
    pub pool_stride: usize,
    pub batch_norm_eps: f64,
    pub batch_norm_momentum: f64,
}

impl Default for FeaturizerConfig {
    fn default() -> Self {
        Self {
            temporal_filters: 40,
            temporal_kernel: 20,
            spatial_filters: 40,
            pool_kernel: 30,
            pool_stride: 15,
            batch_norm_eps: 1e-5,
            batch_norm_momentum: 0.1,
        }
    }
}

impl FeaturizerConfig {
    pub fn temporal_filters(mut self, n: usize) -> Self {
        self.temporal_filters = n;
        self
    }

    pub fn temporal_kernel(mut self, k: usize) -> Self {
        self.temporal_kernel = k;
        self
    }

    pub fn spatial_filters(mut self, n: usize) -> Self {
        self.spatial_filters = n;
        self
    }

    pub fn pool(mut self, kernel: usize, stride: usize) -> Self {
        self.pool_kernel = kernel;
        self.pool_stride = stride;
        self
    }

    /// Embedding sequence length for windows of `window_size` samples, or
    /// `None` when the kernels do not fit.
    ///
    /// `L = (window_size - temporal_kernel + 1 - pool_kernel) / pool_stride + 1`,
    /// which is 72 for 1125-sample windows.
    pub fn sequence_length(&self, window_size: usize) -> Option<usize> {
        if self.temporal_kernel == 0 || self.pool_stride == 0 {
            return None;
        }
        let conv_len = (window_size + 1).checked_sub(self.temporal_kernel)?;
        let pooled = conv_len.checked_sub(self.pool_kernel)?;
        Some(pooled / self.pool_stride + 1)
    }

    pub fn validate(&self, window_size: usize) -> Result<()> {
        if self.temporal_filters == 0 || self.spatial_filters == 0 || self.pool_kernel == 0 {
            return Err(Error::msg(format!(
                "featurizer filters and pool kernel must be positive: {:?}",
                self
            )));
        }
        if !(0.0..=1.0).contains(&self.batch_norm_momentum) || self.batch_norm_eps < 0.0 {
            return Err(Error::msg(format!(
                "invalid batch norm settings: eps {}, momentum {}",
                self.batch_norm_eps, self.batch_norm_momentum
            )));
        }
        match self.sequence_length(window_size) {
            Some(l) if l > 0 => Ok(()),
            _ => Err(Error::msg(format!(
                "window of {} samples is too short for temporal kernel {} and pool kernel {}",
                window_size, self.temporal_kernel, self.pool_kernel
            ))),
        }
    }
}

/// Construction parameters of [`EegTransformer`](crate::EegTransformer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EegTransformerConfig {
    /// Attention blocks in the encoder stack.
    pub num_layers: usize,
    /// EEG electrodes per window; sizes the spatial kernel and positional table.
    pub num_channels: usize,
    /// Must divide `input_embedding_size`.
    pub num_heads: usize,
    /// Time samples per window.
    pub window_size: usize,
    /// Model width E.
    pub input_embedding_size: usize,
    /// Inner width of the feed-forward projection.
    pub hidden_size: usize,
    pub dropout: f64,
    pub num_classes: usize,
    pub layer_norm_eps: f64,
    pub residual_dropout: ResidualDropout,
    pub attention_axis: AttentionAxis,
    pub featurizer: FeaturizerConfig,
}

impl Default for EegTransformerConfig {
    fn default() -> Self {
        Self {
            num_layers: 2,
            num_channels: 22,
            num_heads: 4,
            window_size: 1125,
            input_embedding_size: 40,
            hidden_size: 16,
            dropout: 0.5,
            num_classes: 4,
            layer_norm_eps: 1e-5,
            residual_dropout: ResidualDropout::default(),
            attention_axis: AttentionAxis::default(),
            featurizer: FeaturizerConfig::default(),
        }
    }
}

impl EegTransformerConfig {
    pub fn num_layers(mut self, n: usize) -> Self {
        self.num_layers = n;
        self
    }

    pub fn num_channels(mut self, n: usize) -> Self {
        self.num_channels = n;
        self
    }

    pub fn num_heads(mut self, n: usize) -> Self {
        self.num_heads = n;
        self
    }

    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = n;
        self
    }

    pub fn input_embedding_size(mut self, n: usize) -> Self {
        self.input_embedding_size = n;
        self
    }

    pub fn hidden_size(mut self, n: usize) -> Self {
        self.hidden_size = n;
        self
    }

    pub fn dropout(mut self, p: f64) -> Self {
        self.dropout = p;
        self
    }

    pub fn num_classes(mut self, n: usize) -> Self {
        self.num_classes = n;
        self
    }

    pub fn residual_dropout(mut self, r: ResidualDropout) -> Self {
        self.residual_dropout = r;
        self
    }

    pub fn attention_axis(mut self, a: AttentionAxis) -> Self {
        self.attention_axis = a;
        self
    }

    pub fn featurizer(mut self, f: FeaturizerConfig) -> Self {
        self.featurizer = f;
        self
    }

    /// Embedding sequence length the featurizer produces.
    pub fn sequence_length(&self) -> Option<usize> {
        self.featurizer.sequence_length(self.window_size)
    }

    /// Check every constraint the layers would otherwise fail on later.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("num_layers", self.num_layers),
            ("num_channels", self.num_channels),
            ("num_heads", self.num_heads),
            ("window_size", self.window_size),
            ("input_embedding_size", self.input_embedding_size),
            ("hidden_size", self.hidden_size),
            ("num_classes", self.num_classes),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Error::msg(format!("{} must be positive", name)));
        }
        if self.input_embedding_size % self.num_heads != 0 {
            return Err(Error::msg(format!(
                "num_heads ({}) must divide input_embedding_size ({})",
                self.num_heads, self.input_embedding_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::msg(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        self.featurizer.validate(self.window_size)
    }

    /// Parse from JSON; absent keys take their defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::msg(format!("invalid model config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::msg(format!("cannot serialize model config: {e}")))
    }
}
