// TrialLoader — batching, shuffling, iteration over a TrialDataset

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use eegformer_core::Device;

use crate::batch::LabeledBatch;
use crate::dataset::{EegTrial, TrialDataset};
use crate::error::{DataError, Result};
use crate::transform::Transform;

/// Configuration for the TrialLoader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Trials per batch.
    pub batch_size: usize,
    /// Whether to shuffle indices each epoch.
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch.
    pub drop_last: bool,
    /// Parallel trial fetching when > 0.
    pub num_workers: usize,
    /// Optional random seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 72,
            shuffle: true,
            drop_last: false,
            num_workers: 0,
            seed: None,
        }
    }
}

impl LoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// Wraps a TrialDataset and produces `[B, 1, C, T]` batches.
pub struct TrialLoader<'a> {
    dataset: &'a dyn TrialDataset,
    config: LoaderConfig,
    transforms: Vec<Box<dyn Transform>>,
    device: Device,
    indices: Vec<usize>,
    rng: StdRng,
}

impl<'a> TrialLoader<'a> {
    pub fn new(dataset: &'a dyn TrialDataset, device: Device, config: LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be positive".into()));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            indices: (0..dataset.len()).collect(),
            dataset,
            config,
            transforms: Vec::new(),
            device,
            rng,
        })
    }

    /// Add a transform applied to each trial at fetch time.
    pub fn with_transform(mut self, t: Box<dyn Transform>) -> Self {
        self.transforms.push(t);
        self
    }

    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.config.drop_last {
            n / self.config.batch_size
        } else {
            n.div_ceil(self.config.batch_size)
        }
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Reshuffle indices (called at the start of each epoch).
    pub fn reshuffle(&mut self) {
        if self.config.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    fn fetch_trials(&self, indices: &[usize]) -> Vec<EegTrial> {
        let fetch = |i: usize| {
            self.transforms
                .iter()
                .fold(self.dataset.get(i), |trial, t| t.apply(trial))
        };
        if self.config.num_workers > 0 && indices.len() > 1 {
            indices.par_iter().map(|&i| fetch(i)).collect()
        } else {
            indices.iter().map(|&i| fetch(i)).collect()
        }
    }

    fn batch_at(&self, batch_idx: usize) -> Option<Result<LabeledBatch>> {
        let bs = self.config.batch_size;
        let n = self.dataset.len();
        let start = batch_idx * bs;
        if start >= n || (self.config.drop_last && start + bs > n) {
            return None;
        }
        let end = (start + bs).min(n);
        let trials = self.fetch_trials(&self.indices[start..end]);
        Some(LabeledBatch::from_trials(&trials, &self.device))
    }

    /// All batches of one epoch.
    pub fn epoch_batches(&mut self) -> Result<Vec<LabeledBatch>> {
        self.reshuffle();
        debug!(
            dataset = self.dataset.name(),
            batches = self.num_batches(),
            batch_size = self.config.batch_size,
            "loading epoch"
        );
        (0..self.num_batches())
            .map_while(|i| self.batch_at(i))
            .collect()
    }

    /// Iterate over batches one at a time.
    pub fn iter_batches(&mut self) -> BatchIterator<'_, 'a> {
        self.reshuffle();
        BatchIterator {
            loader: self,
            batch_idx: 0,
        }
    }
}

/// Iterator that yields one batch at a time.
pub struct BatchIterator<'l, 'a> {
    loader: &'l TrialLoader<'a>,
    batch_idx: usize,
}

impl Iterator for BatchIterator<'_, '_> {
    type Item = Result<LabeledBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.loader.batch_at(self.batch_idx)?;
        self.batch_idx += 1;
        Some(batch)
    }
}
