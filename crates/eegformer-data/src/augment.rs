// SegmentSplicer — segment-recombination augmentation for EEG windows
//
// A synthetic window of class c is stitched together from `num_segments`
// consecutive time segments, each copied from an independently drawn source
// window of class c:
//
//   time:     |  seg 0  |  seg 1  |  ...  |  seg 7  | tail |
//   source:     src_a     src_b             src_h     zero
//
// Segment j covers samples [j·L, (j+1)·L) on every electrode row. Sources
// are drawn uniformly with replacement from the class pool, one draw per
// segment. Samples past num_segments·L are left at zero (for the canonical
// 8 × 125 on 1125-sample windows that is the last 125 samples).
//
// Each class contributes batch_size / num_classes windows. The stacked
// result is shuffled with one permutation shared by windows and labels.

use eegformer_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use tracing::debug;

use crate::batch::LabeledBatch;
use crate::error::{DataError, Result};

/// Geometry of the splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicerConfig {
    pub num_classes: usize,
    pub num_segments: usize,
    /// Samples per segment.
    pub segment_len: usize,
}

impl Default for SplicerConfig {
    fn default() -> Self {
        Self {
            num_classes: 4,
            num_segments: 8,
            segment_len: 125,
        }
    }
}

impl SplicerConfig {
    pub fn num_classes(mut self, n: usize) -> Self {
        self.num_classes = n;
        self
    }

    pub fn num_segments(mut self, n: usize) -> Self {
        self.num_segments = n;
        self
    }

    pub fn segment_len(mut self, len: usize) -> Self {
        self.segment_len = len;
        self
    }

    /// Samples covered by all segments together.
    pub fn covered_len(&self) -> usize {
        self.num_segments * self.segment_len
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 || self.num_segments == 0 || self.segment_len == 0 {
            return Err(DataError::InvalidConfig(format!(
                "splicer needs positive classes, segments and segment length, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Synthesizes labeled training windows by splicing same-class segments.
#[derive(Debug, Clone)]
pub struct SegmentSplicer {
    config: SplicerConfig,
}

impl Default for SegmentSplicer {
    fn default() -> Self {
        Self {
            config: SplicerConfig::default(),
        }
    }
}

impl SegmentSplicer {
    pub fn new(config: SplicerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplicerConfig {
        &self.config
    }

    /// [`augment_with_rng`](Self::augment_with_rng) with the thread-local RNG.
    pub fn augment(
        &self,
        windows: &Tensor,
        labels: &[usize],
        batch_size: usize,
        device: &Device,
    ) -> Result<LabeledBatch> {
        self.augment_with_rng(windows, labels, batch_size, device, &mut thread_rng())
    }

    /// Produce `batch_size` synthetic windows from `windows` (`[N, C, T]` or
    /// `[N, 1, C, T]`, time on the last axis) and their `labels`.
    ///
    /// The output has the input's per-window shape and lives on `device`.
    ///
    /// # Errors
    /// - `BatchSizeNotDivisible` if `batch_size % num_classes != 0`
    /// - `LengthMismatch` if `labels.len()` differs from the window count
    /// - `LabelOutOfRange` for a label `>= num_classes`
    /// - `SegmentsExceedWindow` if the segments do not fit the time axis
    /// - `EmptyClass` if a class has no source windows
    pub fn augment_with_rng<R: Rng + ?Sized>(
        &self,
        windows: &Tensor,
        labels: &[usize],
        batch_size: usize,
        device: &Device,
        rng: &mut R,
    ) -> Result<LabeledBatch> {
        let SplicerConfig {
            num_classes,
            num_segments,
            segment_len,
        } = self.config;

        if batch_size == 0 {
            return Err(DataError::InvalidConfig(
                "batch size must be a positive multiple of the class count".to_string(),
            ));
        }
        if batch_size % num_classes != 0 {
            return Err(DataError::BatchSizeNotDivisible {
                batch_size,
                num_classes,
            });
        }

        let dims = windows.dims();
        if dims.len() != 3 && dims.len() != 4 {
            return Err(eegformer_core::Error::msg(format!(
                "expected [N, C, T] or [N, 1, C, T] windows, got {}",
                windows.shape()
            ))
            .into());
        }
        let n = dims[0];
        if labels.len() != n {
            return Err(DataError::LengthMismatch {
                what: "labels for source windows",
                expected: n,
                got: labels.len(),
            });
        }
        let n_times = dims[dims.len() - 1];
        if self.config.covered_len() > n_times {
            return Err(DataError::SegmentsExceedWindow {
                num_segments,
                segment_len,
                window_len: n_times,
            });
        }
        let window_elems: usize = dims[1..].iter().product();
        let rows = window_elems / n_times.max(1);

        let mut pools: Vec<Vec<usize>> = vec![Vec::new(); num_classes];
        for (index, &label) in labels.iter().enumerate() {
            pools
                .get_mut(label)
                .ok_or(DataError::LabelOutOfRange {
                    index,
                    label,
                    num_classes,
                })?
                .push(index);
        }

        let per_class = batch_size / num_classes;
        if per_class > 0 {
            if let Some(class) = pools.iter().position(|p| p.is_empty()) {
                return Err(DataError::EmptyClass { class });
            }
        }
        debug!(
            pool_sizes = ?pools.iter().map(Vec::len).collect::<Vec<_>>(),
            per_class,
            "splicing synthetic windows"
        );

        let src = windows.as_slice();
        let mut synthetic = vec![0.0f32; batch_size * window_elems];
        let mut synthetic_labels = Vec::with_capacity(batch_size);

        for (class, pool) in pools.iter().enumerate() {
            for k in 0..per_class {
                let out = class * per_class + k;
                let dst = &mut synthetic[out * window_elems..(out + 1) * window_elems];
                for seg in 0..num_segments {
                    let source = pool[rng.gen_range(0..pool.len())];
                    let src_window = &src[source * window_elems..(source + 1) * window_elems];
                    let start = seg * segment_len;
                    for row in 0..rows {
                        let at = row * n_times + start;
                        dst[at..at + segment_len]
                            .copy_from_slice(&src_window[at..at + segment_len]);
                    }
                }
                synthetic_labels.push(class);
            }
        }

        let mut order: Vec<usize> = (0..batch_size).collect();
        order.shuffle(rng);

        let mut shuffled = Vec::with_capacity(synthetic.len());
        let mut shuffled_labels = Vec::with_capacity(batch_size);
        for &i in &order {
            shuffled.extend_from_slice(&synthetic[i * window_elems..(i + 1) * window_elems]);
            shuffled_labels.push(synthetic_labels[i]);
        }

        let mut out_dims = dims.to_vec();
        out_dims[0] = batch_size;
        let windows = Tensor::from_vec(shuffled, out_dims, device)?;
        LabeledBatch::new(windows, shuffled_labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_geometry() {
        let s = SegmentSplicer::default();
        assert_eq!(s.config().covered_len(), 1000);
    }

    #[test]
    fn zero_segments_rejected() {
        assert!(SegmentSplicer::new(SplicerConfig::default().num_segments(0)).is_err());
    }

    #[test]
    fn zero_batch_rejected() {
        let dev = Device::Cpu;
        let s = SegmentSplicer::new(SplicerConfig::default().segment_len(1).num_segments(2)).unwrap();
        let w = Tensor::zeros((1, 1, 2, 4), &dev).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = s.augment_with_rng(&w, &[0], 0, &dev, &mut rng).unwrap_err();
        assert!(matches!(err, DataError::InvalidConfig(_)));
    }

    #[test]
    fn unsupported_rank_names_both_layouts() {
        let dev = Device::Cpu;
        let s = SegmentSplicer::new(SplicerConfig::default().segment_len(1).num_segments(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for w in [
            Tensor::zeros((4, 8), &dev).unwrap(),
            Tensor::zeros(vec![4, 1, 1, 2, 8], &dev).unwrap(),
        ] {
            let err = s.augment_with_rng(&w, &[0, 1, 2, 3], 4, &dev, &mut rng).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("[N, C, T] or [N, 1, C, T]"), "{msg}");
        }
    }
}
