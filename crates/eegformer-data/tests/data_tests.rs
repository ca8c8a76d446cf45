// Tests for eegformer-data: SegmentSplicer, TrialLoader, datasets, transforms

use eegformer_core::{Device, Tensor};
use eegformer_data::{
    DataError, EegTrial, ExponentialMovingStandardize, LabeledBatch, LoaderConfig, ScaleSignal,
    SegmentSplicer, SplicerConfig, StandardizeConfig, TrialDataset, TrialLoader, VecTrialDataset,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DEV: Device = Device::Cpu;
const CHANNELS: usize = 22;
const TIMES: usize = 1125;
const MARKER: f32 = 1_000_000.0;

/// Window `i` holds `i·1e6 + row·2000 + t`, so every sample names its source.
fn marked_windows(labels: &[usize]) -> Tensor {
    let n = labels.len();
    let mut data = Vec::with_capacity(n * CHANNELS * TIMES);
    for i in 0..n {
        for row in 0..CHANNELS {
            for t in 0..TIMES {
                data.push(i as f32 * MARKER + (row * 2000 + t) as f32);
            }
        }
    }
    Tensor::from_vec(data, (n, 1, CHANNELS, TIMES), &DEV).unwrap()
}

fn cycling_labels(n: usize) -> Vec<usize> {
    (0..n).map(|i| i % 4).collect()
}

fn window(batch: &LabeledBatch, k: usize) -> &[f32] {
    let len = CHANNELS * TIMES;
    &batch.windows.as_slice()[k * len..(k + 1) * len]
}

// SegmentSplicer

#[test]
fn test_augment_balanced_counts() {
    let labels = cycling_labels(16);
    let windows = marked_windows(&labels);
    let mut rng = StdRng::seed_from_u64(7);
    let out = SegmentSplicer::default()
        .augment_with_rng(&windows, &labels, 8, &DEV, &mut rng)
        .unwrap();
    assert_eq!(out.len(), 8);
    assert_eq!(out.windows.dims(), &[8, 1, CHANNELS, TIMES]);
    assert_eq!(out.class_counts(4), vec![2, 2, 2, 2]);
}

#[test]
fn test_augment_segments_come_from_same_class() {
    let labels = cycling_labels(16);
    let windows = marked_windows(&labels);
    let src = windows.as_slice();
    let mut rng = StdRng::seed_from_u64(11);
    let out = SegmentSplicer::default()
        .augment_with_rng(&windows, &labels, 16, &DEV, &mut rng)
        .unwrap();

    for k in 0..out.len() {
        let synth = window(&out, k);
        for seg in 0..8 {
            let start = seg * 125;
            let source = (synth[start] / MARKER).floor() as usize;
            assert_eq!(labels[source], out.labels[k], "window {k} segment {seg}");
            let src_window = &src[source * CHANNELS * TIMES..(source + 1) * CHANNELS * TIMES];
            for row in 0..CHANNELS {
                let at = row * TIMES + start;
                assert_eq!(&synth[at..at + 125], &src_window[at..at + 125]);
            }
        }
    }
}

#[test]
fn test_augment_tail_stays_zero() {
    let labels = cycling_labels(8);
    let windows = marked_windows(&labels);
    let out = SegmentSplicer::default()
        .augment(&windows, &labels, 4, &DEV)
        .unwrap();
    for k in 0..out.len() {
        let synth = window(&out, k);
        for row in 0..CHANNELS {
            assert!(synth[row * TIMES + 1000..(row + 1) * TIMES]
                .iter()
                .all(|&v| v == 0.0));
        }
    }
}

#[test]
fn test_augment_draws_segments_independently() {
    let labels = cycling_labels(16);
    let windows = marked_windows(&labels);
    let mut rng = StdRng::seed_from_u64(3);
    let out = SegmentSplicer::default()
        .augment_with_rng(&windows, &labels, 16, &DEV, &mut rng)
        .unwrap();
    let mixed = (0..out.len()).any(|k| {
        let synth = window(&out, k);
        let first = (synth[0] / MARKER).floor();
        (1..8).any(|seg| (synth[seg * 125] / MARKER).floor() != first)
    });
    assert!(mixed);
}

#[test]
fn test_augment_shuffles_classes() {
    let labels = cycling_labels(16);
    let windows = marked_windows(&labels);
    let mut rng = StdRng::seed_from_u64(5);
    let out = SegmentSplicer::default()
        .augment_with_rng(&windows, &labels, 40, &DEV, &mut rng)
        .unwrap();
    let mut sorted = out.labels.clone();
    sorted.sort_unstable();
    assert_ne!(out.labels, sorted);
}

#[test]
fn test_augment_is_reproducible_with_seed() {
    let labels = cycling_labels(8);
    let windows = marked_windows(&labels);
    let splicer = SegmentSplicer::default();
    let a = splicer
        .augment_with_rng(&windows, &labels, 8, &DEV, &mut StdRng::seed_from_u64(42))
        .unwrap();
    let b = splicer
        .augment_with_rng(&windows, &labels, 8, &DEV, &mut StdRng::seed_from_u64(42))
        .unwrap();
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.windows.to_vec(), b.windows.to_vec());
}

#[test]
fn test_augment_rejects_indivisible_batch_size() {
    let labels = cycling_labels(8);
    let windows = marked_windows(&labels);
    let err = SegmentSplicer::default()
        .augment(&windows, &labels, 3, &DEV)
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::BatchSizeNotDivisible {
            batch_size: 3,
            num_classes: 4
        }
    ));
}

#[test]
fn test_augment_rejects_empty_class() {
    let labels = vec![0, 1, 3, 0];
    let windows = marked_windows(&labels);
    let err = SegmentSplicer::default()
        .augment(&windows, &labels, 4, &DEV)
        .unwrap_err();
    assert!(matches!(err, DataError::EmptyClass { class: 2 }));
}

#[test]
fn test_augment_rejects_bad_labels() {
    let windows = marked_windows(&[0, 1, 2, 3]);
    let out_of_range = SegmentSplicer::default().augment(&windows, &[0, 1, 2, 9], 4, &DEV);
    assert!(matches!(
        out_of_range,
        Err(DataError::LabelOutOfRange { index: 3, label: 9, .. })
    ));
    let short = SegmentSplicer::default().augment(&windows, &[0, 1, 2], 4, &DEV);
    assert!(matches!(short, Err(DataError::LengthMismatch { .. })));
}

#[test]
fn test_augment_rejects_segments_longer_than_window() {
    let windows = Tensor::zeros((4, 2, 100), &DEV).unwrap();
    let err = SegmentSplicer::default()
        .augment(&windows, &[0, 1, 2, 3], 4, &DEV)
        .unwrap_err();
    assert!(matches!(
        err,
        DataError::SegmentsExceedWindow { window_len: 100, .. }
    ));
}

#[test]
fn test_augment_rank3_custom_geometry() {
    // [N, C, T] = [4, 2, 6], two classes, three segments of two samples
    let data: Vec<f32> = (0..48).map(|v| v as f32).collect();
    let windows = Tensor::from_vec(data, (4, 2, 6), &DEV).unwrap();
    let splicer = SegmentSplicer::new(
        SplicerConfig::default()
            .num_classes(2)
            .num_segments(3)
            .segment_len(2),
    )
    .unwrap();
    let out = splicer.augment(&windows, &[0, 1, 0, 1], 6, &DEV).unwrap();
    assert_eq!(out.windows.dims(), &[6, 2, 6]);
    assert_eq!(out.class_counts(2), vec![3, 3]);
    let labels_t = out.labels_tensor().unwrap();
    assert_eq!(labels_t.dims(), &[6]);
    assert_eq!(labels_t.device(), &DEV);
}

// Datasets and loader

fn toy_dataset(n: usize) -> VecTrialDataset {
    let trials = (0..n)
        .map(|i| EegTrial::new(vec![i as f32; 2 * 5], 2, 5, i % 4).unwrap())
        .collect();
    VecTrialDataset::new(trials, 4, "toy").unwrap()
}

#[test]
fn test_loader_batch_layout() {
    let ds = toy_dataset(10);
    let mut loader = TrialLoader::new(&ds, DEV, LoaderConfig::default().batch_size(4).shuffle(false))
        .unwrap();
    assert_eq!(loader.num_batches(), 3);
    let batches = loader.epoch_batches().unwrap();
    let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(batches[0].windows.dims(), &[4, 1, 2, 5]);
    assert_eq!(batches[2].labels, vec![0, 1]);
}

#[test]
fn test_loader_drop_last() {
    let ds = toy_dataset(10);
    let mut loader = TrialLoader::new(
        &ds,
        DEV,
        LoaderConfig::default().batch_size(4).drop_last(true),
    )
    .unwrap();
    assert_eq!(loader.num_batches(), 2);
    assert_eq!(loader.iter_batches().count(), 2);
}

fn first_values(loader: &mut TrialLoader<'_>) -> Vec<f32> {
    loader
        .iter_batches()
        .flat_map(|b| {
            let b = b.unwrap();
            (0..b.len())
                .map(|k| b.windows.as_slice()[k * 10])
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn test_loader_seeded_shuffle_visits_every_trial() {
    let ds = toy_dataset(12);
    let config = LoaderConfig::default().batch_size(5).seed(99);
    let mut a = TrialLoader::new(&ds, DEV, config.clone()).unwrap();
    let mut b = TrialLoader::new(&ds, DEV, config).unwrap();
    let order_a = first_values(&mut a);
    assert_eq!(order_a, first_values(&mut b));

    let mut seen: Vec<usize> = order_a.iter().map(|&v| v as usize).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..12).collect::<Vec<_>>());
}

#[test]
fn test_loader_parallel_fetch_applies_transforms() {
    let ds = toy_dataset(8);
    let mut loader = TrialLoader::new(
        &ds,
        DEV,
        LoaderConfig::default().batch_size(8).shuffle(false).num_workers(4),
    )
    .unwrap()
    .with_transform(Box::new(ScaleSignal::new(10.0)));
    let batch = loader.epoch_batches().unwrap().remove(0);
    assert_eq!(batch.windows.as_slice()[3 * 10], 30.0);
}

#[test]
fn test_loader_rejects_zero_batch_size() {
    let ds = toy_dataset(4);
    assert!(TrialLoader::new(&ds, DEV, LoaderConfig::default().batch_size(0)).is_err());
}

#[test]
fn test_preprocess_standardizes_every_channel() {
    let trials = (0..4)
        .map(|i| {
            let signal = (0..2 * 50).map(|t| (t as f32 * 0.3).sin() * 1e-5 + i as f32 * 1e-6).collect();
            EegTrial::new(signal, 2, 50, i % 4).unwrap()
        })
        .collect();
    let ds = VecTrialDataset::new(trials, 4, "raw").unwrap();
    let ems = ExponentialMovingStandardize::new(StandardizeConfig::default().init_block_size(Some(50)));
    let ds = ds.preprocess(&ScaleSignal::microvolts()).preprocess(&ems);
    for trial in ds.trials() {
        for c in 0..trial.n_channels {
            let ch = trial.channel(c);
            let mean: f32 = ch.iter().sum::<f32>() / ch.len() as f32;
            assert!(mean.abs() < 1e-3);
        }
    }
    assert_eq!(ds.n_times(), 50);
}

#[test]
fn test_augment_full_dataset_batch() {
    let trials: Vec<EegTrial> = (0..8)
        .map(|i| EegTrial::new(vec![i as f32; CHANNELS * TIMES], CHANNELS, TIMES, i % 4).unwrap())
        .collect();
    let source = LabeledBatch::from_trials(&trials, &DEV).unwrap();
    let out = SegmentSplicer::default()
        .augment(&source.windows, &source.labels, 8, &DEV)
        .unwrap();
    for k in 0..out.len() {
        let synth = window(&out, k);
        // constant trials: every covered sample is some same-class source index
        assert_eq!(synth[0] as usize % 4, out.labels[k]);
    }
}
