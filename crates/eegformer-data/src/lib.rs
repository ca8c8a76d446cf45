//! # eegformer-data
//!
//! EEG trial handling for the eegformer workspace:
//!
//! - [`TrialDataset`] trait and the in-memory [`VecTrialDataset`]
//! - [`Transform`]s for preprocessing ([`ScaleSignal`], [`ExponentialMovingStandardize`])
//! - [`train_valid_split`] for contiguous session splits
//! - [`TrialLoader`] — shuffled `[B, 1, C, T]` batches, optionally fetched in parallel
//! - [`SegmentSplicer`] — same-class segment recombination augmentation

pub mod augment;
pub mod batch;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod split;
pub mod transform;

pub use augment::{SegmentSplicer, SplicerConfig};
pub use batch::LabeledBatch;
pub use dataset::{EegTrial, TrialDataset, VecTrialDataset};
pub use error::{DataError, Result};
pub use loader::{BatchIterator, LoaderConfig, TrialLoader};
pub use split::train_valid_split;
pub use transform::{
    Compose, ExponentialMovingStandardize, ScaleSignal, StandardizeConfig, Transform,
};
