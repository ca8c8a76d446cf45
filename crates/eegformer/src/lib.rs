//! # eegformer
//!
//! Hybrid convolution + self-attention classifier for motor-imagery EEG.
//!
//! This is the top-level facade crate: it holds the model and re-exports the
//! tensor, layer and data crates.
//!
//! ## Usage
//!
//! ```rust
//! use eegformer::prelude::*;
//!
//! let config = EegTransformerConfig::default().num_layers(1);
//! let model = EegTransformer::new(config, &Device::Cpu)?;
//! assert_eq!(model.sequence_length(), 72);
//! # Ok::<(), eegformer::Error>(())
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `eegformer-core` | Tensor, Shape, Device, Error |
//! | `eegformer-nn` | Layers (Conv2d, BatchNorm2d, MultiHeadAttention, ...) and the `Module` trait |
//! | `eegformer-data` | Trials, preprocessing, batch loader, segment-splicing augmentation |
//! | `eegformer` | Featurizer, attention encoder, classification head, full model |

/// Re-export core types.
pub use eegformer_core::{Device, Error, Result, Shape, Tensor};

/// Re-export layers.
pub mod nn {
    pub use eegformer_nn::*;
}

/// Re-export trial handling and augmentation.
pub mod data {
    pub use eegformer_data::*;
}

pub mod config;
pub mod embedding;
pub mod encoder;
pub mod featurizer;
pub mod head;
pub mod model;
pub mod positional;

pub use config::{AttentionAxis, EegTransformerConfig, FeaturizerConfig, ResidualDropout};
pub use embedding::InputEmbedding;
pub use encoder::{AttentionBlock, AttentionEncoderStack};
pub use featurizer::TemporalConvFeaturizer;
pub use head::ClassificationHead;
pub use model::EegTransformer;
pub use positional::PositionalEncoding;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::data::{
        train_valid_split, Compose, DataError, EegTrial, ExponentialMovingStandardize,
        LabeledBatch, LoaderConfig, ScaleSignal, SegmentSplicer, SplicerConfig,
        StandardizeConfig, Transform, TrialDataset, TrialLoader, VecTrialDataset,
    };
    pub use crate::nn::Module;
    pub use crate::{
        AttentionAxis, ClassificationHead, EegTransformer, EegTransformerConfig,
        FeaturizerConfig, PositionalEncoding, ResidualDropout, TemporalConvFeaturizer,
    };
    pub use crate::{Device, Error, Result, Shape, Tensor};
}
