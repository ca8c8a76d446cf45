// LabeledBatch — a window tensor paired with one class label per window
//
// Windows are laid out [N, 1, C, T] when built from trials (the featurizer's
// conv layout) but any tensor whose first dim is N is accepted, so the
// splicer's output for [N, C, T] input is a LabeledBatch too.

use eegformer_core::{Device, Tensor};

use crate::dataset::EegTrial;
use crate::error::{DataError, Result};

#[derive(Debug, Clone)]
pub struct LabeledBatch {
    pub windows: Tensor,
    pub labels: Vec<usize>,
}

impl LabeledBatch {
    pub fn new(windows: Tensor, labels: Vec<usize>) -> Result<Self> {
        let n = windows.dim(0)?;
        if n != labels.len() {
            return Err(DataError::LengthMismatch {
                what: "labels per batch",
                expected: n,
                got: labels.len(),
            });
        }
        Ok(Self { windows, labels })
    }

    /// Stack trials into `[N, 1, C, T]` on `device`.
    pub fn from_trials(trials: &[EegTrial], device: &Device) -> Result<Self> {
        let first = trials.first().ok_or(DataError::EmptyDataset)?;
        let (c, t) = (first.n_channels, first.n_times);
        let mut data = Vec::with_capacity(trials.len() * c * t);
        for trial in trials {
            if trial.n_channels != c {
                return Err(DataError::LengthMismatch {
                    what: "trial channel count in batch",
                    expected: c,
                    got: trial.n_channels,
                });
            }
            if trial.n_times != t {
                return Err(DataError::LengthMismatch {
                    what: "trial sample count in batch",
                    expected: t,
                    got: trial.n_times,
                });
            }
            data.extend_from_slice(&trial.signal);
        }
        let windows = Tensor::from_vec(data, (trials.len(), 1, c, t), device)?;
        Self::new(windows, trials.iter().map(|t| t.label).collect())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn device(&self) -> &Device {
        self.windows.device()
    }

    /// Number of windows per class; labels `>= num_classes` are ignored.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for &l in &self.labels {
            if let Some(c) = counts.get_mut(l) {
                *c += 1;
            }
        }
        counts
    }

    /// Labels as an f32 `[N]` tensor on the windows' device.
    pub fn labels_tensor(&self) -> Result<Tensor> {
        let data = self.labels.iter().map(|&l| l as f32).collect();
        Ok(Tensor::from_vec(data, self.labels.len(), self.windows.device())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_trials_stacks_planes() {
        let trials = vec![
            EegTrial::new(vec![1.0; 6], 2, 3, 0).unwrap(),
            EegTrial::new(vec![2.0; 6], 2, 3, 1).unwrap(),
        ];
        let batch = LabeledBatch::from_trials(&trials, &Device::Cpu).unwrap();
        assert_eq!(batch.windows.dims(), &[2, 1, 2, 3]);
        assert_eq!(batch.labels, vec![0, 1]);
    }

    #[test]
    fn transposed_geometry_reports_channel_count() {
        let trials = vec![
            EegTrial::new(vec![0.0; 10], 2, 5, 0).unwrap(),
            EegTrial::new(vec![0.0; 10], 5, 2, 0).unwrap(),
        ];
        let err = LabeledBatch::from_trials(&trials, &Device::Cpu).unwrap_err();
        assert!(matches!(
            err,
            DataError::LengthMismatch {
                expected: 2,
                got: 5,
                ..
            }
        ));
        assert!(err.to_string().contains("channel count"));
    }
}
