// TrialDataset — indexed collection of labeled EEG trials

use rayon::prelude::*;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::split::train_valid_split;
use crate::transform::Transform;

/// One labeled EEG window: `n_channels × n_times` samples, channel-major.
#[derive(Debug, Clone, PartialEq)]
pub struct EegTrial {
    pub signal: Vec<f32>,
    pub n_channels: usize,
    pub n_times: usize,
    pub label: usize,
}

impl EegTrial {
    pub fn new(signal: Vec<f32>, n_channels: usize, n_times: usize, label: usize) -> Result<Self> {
        if signal.len() != n_channels * n_times {
            return Err(DataError::LengthMismatch {
                what: "trial signal length",
                expected: n_channels * n_times,
                got: signal.len(),
            });
        }
        Ok(Self {
            signal,
            n_channels,
            n_times,
            label,
        })
    }

    /// Samples of one electrode.
    pub fn channel(&self, c: usize) -> &[f32] {
        &self.signal[c * self.n_times..(c + 1) * self.n_times]
    }

    pub fn channel_mut(&mut self, c: usize) -> &mut [f32] {
        &mut self.signal[c * self.n_times..(c + 1) * self.n_times]
    }
}

/// A dataset is an indexed collection of trials sharing one geometry.
///
/// Implementations must be `Send + Sync` so the loader can fetch from
/// multiple threads.
pub trait TrialDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the trial at `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.len()`.
    fn get(&self, index: usize) -> EegTrial;

    fn n_channels(&self) -> usize;

    fn n_times(&self) -> usize;

    fn num_classes(&self) -> usize;

    fn name(&self) -> &str {
        "trials"
    }
}

/// In-memory trials, validated for a common geometry and label range.
#[derive(Debug, Clone)]
pub struct VecTrialDataset {
    trials: Vec<EegTrial>,
    n_channels: usize,
    n_times: usize,
    num_classes: usize,
    dataset_name: String,
}

impl VecTrialDataset {
    pub fn new(trials: Vec<EegTrial>, num_classes: usize, name: &str) -> Result<Self> {
        let first = trials.first().ok_or(DataError::EmptyDataset)?;
        let (n_channels, n_times) = (first.n_channels, first.n_times);
        for (index, t) in trials.iter().enumerate() {
            if t.n_channels != n_channels {
                return Err(DataError::LengthMismatch {
                    what: "trial channel count",
                    expected: n_channels,
                    got: t.n_channels,
                });
            }
            if t.n_times != n_times {
                return Err(DataError::LengthMismatch {
                    what: "trial sample count",
                    expected: n_times,
                    got: t.n_times,
                });
            }
            if t.label >= num_classes {
                return Err(DataError::LabelOutOfRange {
                    index,
                    label: t.label,
                    num_classes,
                });
            }
        }
        Ok(Self {
            trials,
            n_channels,
            n_times,
            num_classes,
            dataset_name: name.to_string(),
        })
    }

    pub fn trials(&self) -> &[EegTrial] {
        &self.trials
    }

    pub fn labels(&self) -> Vec<usize> {
        self.trials.iter().map(|t| t.label).collect()
    }

    /// Run a preprocessing transform over every trial (in parallel).
    pub fn preprocess(self, transform: &dyn Transform) -> Self {
        debug!(
            dataset = %self.dataset_name,
            trials = self.trials.len(),
            "preprocessing trials"
        );
        let trials = self
            .trials
            .into_par_iter()
            .map(|t| transform.apply(t))
            .collect();
        Self { trials, ..self }
    }

    /// The trials at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let trials = indices
            .iter()
            .map(|&i| {
                self.trials.get(i).cloned().ok_or(DataError::LengthMismatch {
                    what: "subset index bound",
                    expected: self.trials.len(),
                    got: i,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(trials, self.num_classes, &self.dataset_name)
    }

    /// Contiguous training / validation split of the session.
    pub fn split(&self, training_fraction: f64) -> Result<(Self, Self)> {
        let (train, valid) = train_valid_split(self.trials.len(), training_fraction)?;
        let train: Vec<usize> = train.collect();
        let valid: Vec<usize> = valid.collect();
        Ok((self.select(&train)?, self.select(&valid)?))
    }
}

impl TrialDataset for VecTrialDataset {
    fn len(&self) -> usize {
        self.trials.len()
    }

    fn get(&self, index: usize) -> EegTrial {
        self.trials[index].clone()
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn n_times(&self) -> usize {
        self.n_times
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn name(&self) -> &str {
        &self.dataset_name
    }
}
