// Integration tests for the eegformer model crate
//
// Shapes of the full pipeline, the featurizer geometry, the encoder blocks,
// the dormant input path, and configuration rejection.

use eegformer::prelude::*;
use eegformer::{AttentionBlock, AttentionEncoderStack, InputEmbedding};
use rand::rngs::StdRng;
use rand::SeedableRng;

const DEV: Device = Device::Cpu;

fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

fn assert_slice_approx(got: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(got.len(), expected.len(), "length mismatch");
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        assert!(
            approx_eq(*g, *e, tol),
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

fn seeded_windows(shape: (usize, usize, usize), seed: u64) -> Result<Tensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    Tensor::randn_with(shape, &mut rng, &DEV)
}

/// 4 electrodes × 200 samples: L = (200 - 20 + 1 - 30) / 15 + 1 = 11.
fn small_config() -> EegTransformerConfig {
    EegTransformerConfig::default()
        .num_channels(4)
        .window_size(200)
        .num_layers(1)
}

// Full model

#[test]
fn test_end_to_end_canonical_logits() -> Result<()> {
    let config = EegTransformerConfig::default()
        .num_layers(2)
        .num_channels(22)
        .num_heads(4)
        .window_size(1125)
        .input_embedding_size(40)
        .hidden_size(16)
        .dropout(0.5)
        .num_classes(4);
    let model = EegTransformer::new(config, &DEV)?;
    let x = seeded_windows((8, 22, 1125), 1)?;

    let logits = model.forward(&x)?;
    assert_eq!(logits.dims(), &[8, 4]);
    assert!(logits.as_slice().iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn test_forward_accepts_plane_axis() -> Result<()> {
    let model = EegTransformer::new(small_config(), &DEV)?;
    model.eval();
    let x = seeded_windows((3, 4, 200), 2)?;

    let a = model.forward(&x)?;
    let b = model.forward(&x.unsqueeze(1)?)?;
    assert_eq!(a.dims(), &[3, 4]);
    assert_slice_approx(a.as_slice(), b.as_slice(), 1e-6);
    Ok(())
}

#[test]
fn test_predict_returns_valid_classes() -> Result<()> {
    let model = EegTransformer::new(small_config(), &DEV)?;
    let x = seeded_windows((5, 4, 200), 3)?;
    let classes = model.predict(&x)?;
    assert_eq!(classes.len(), 5);
    assert!(classes.iter().all(|&c| c < 4));
    Ok(())
}

#[test]
fn test_eval_mode_is_deterministic() -> Result<()> {
    let model = EegTransformer::new(small_config(), &DEV)?;
    let x = seeded_windows((4, 4, 200), 4)?;
    model.eval();
    assert!(!model.is_training());
    let a = model.forward(&x)?;
    let b = model.forward(&x)?;
    assert_eq!(a.as_slice(), b.as_slice());
    model.train();
    assert!(model.is_training());
    Ok(())
}

#[test]
fn test_canonical_parameter_counts() -> Result<()> {
    let model = EegTransformer::new(EegTransformerConfig::default(), &DEV)?;
    // featurizer 37_880 + two blocks of 8_056 + head 244
    assert_eq!(model.trainable_params_count(), 54_236);
    // frozen input embedding: 1125 × 40 weights + 40 biases
    assert_eq!(
        model.num_parameters() - model.trainable_params_count(),
        45_040
    );
    Ok(())
}

#[test]
fn test_named_parameters_are_dotted() -> Result<()> {
    let model = EegTransformer::new(small_config().num_layers(2), &DEV)?;
    let names: Vec<String> = model
        .named_parameters()
        .into_iter()
        .map(|(n, _)| n)
        .collect();
    for expected in [
        "featurizer.temporal_conv.weight",
        "featurizer.spatial_norm.bias",
        "encoder.layers.1.attention.in_proj.weight",
        "encoder.layers.0.linear2.bias",
        "head.1.weight",
        "input_embedding.linear.weight",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    assert_eq!(names.len(), model.parameters().len());
    Ok(())
}

#[test]
fn test_invalid_configs_rejected() {
    let bad = [
        EegTransformerConfig::default().num_heads(3),
        EegTransformerConfig::default().dropout(1.0),
        EegTransformerConfig::default().dropout(-0.1),
        EegTransformerConfig::default().window_size(40),
        EegTransformerConfig::default().num_layers(0),
    ];
    for config in bad {
        assert!(EegTransformer::new(config.clone(), &DEV).is_err(), "{config:?}");
    }
}

// Featurizer

#[test]
fn test_featurizer_sequence_length_independent_of_batch() -> Result<()> {
    let featurizer =
        TemporalConvFeaturizer::new(&FeaturizerConfig::default(), 22, 1125, 40, 0.5, &DEV)?;
    assert_eq!(featurizer.sequence_length(), 72);
    for n in [1, 3] {
        let y = featurizer.forward(&seeded_windows((n, 22, 1125), 5)?.unsqueeze(1)?)?;
        assert_eq!(y.dims(), &[n, 72, 40]);
    }
    Ok(())
}

#[test]
fn test_featurizer_custom_geometry() -> Result<()> {
    let geometry = FeaturizerConfig::default()
        .temporal_filters(8)
        .temporal_kernel(5)
        .spatial_filters(6)
        .pool(4, 2);
    // (50 - 5 + 1 - 4) / 2 + 1 = 22
    let featurizer = TemporalConvFeaturizer::new(&geometry, 3, 50, 12, 0.0, &DEV)?;
    let y = featurizer.forward(&seeded_windows((2, 3, 50), 6)?)?;
    assert_eq!(y.dims(), &[2, 22, 12]);
    Ok(())
}

#[test]
fn test_featurizer_rejects_wrong_channel_count() -> Result<()> {
    let featurizer =
        TemporalConvFeaturizer::new(&FeaturizerConfig::default(), 22, 1125, 40, 0.5, &DEV)?;
    let x = seeded_windows((2, 21, 1125), 7)?;
    assert!(matches!(
        featurizer.forward(&x),
        Err(Error::ShapeMismatch { .. })
    ));
    Ok(())
}

// Encoder

#[test]
fn test_encoder_preserves_shape() -> Result<()> {
    for layers in [1, 3] {
        let config = EegTransformerConfig::default().num_layers(layers);
        let encoder = AttentionEncoderStack::new(&config, &DEV)?;
        assert_eq!(encoder.num_layers(), layers);
        let x = Tensor::randn((3, 72, 40), &DEV)?;
        assert_eq!(encoder.forward(&x)?.dims(), &[3, 72, 40]);
    }
    Ok(())
}

#[test]
fn test_bypassed_dropout_never_reaches_output() -> Result<()> {
    let config = EegTransformerConfig::default().residual_dropout(ResidualDropout::Bypassed);
    let block = AttentionBlock::new(&config, &DEV)?;
    let x = Tensor::randn((2, 9, 40), &DEV)?;

    block.train();
    let trained = block.forward(&x)?;
    block.eval();
    let evaluated = block.forward(&x)?;
    assert_eq!(trained.as_slice(), evaluated.as_slice());
    Ok(())
}

#[test]
fn test_faithful_and_corrected_dropout_are_live() -> Result<()> {
    for mode in [ResidualDropout::Faithful, ResidualDropout::Corrected] {
        let config = EegTransformerConfig::default().residual_dropout(mode);
        let block = AttentionBlock::new(&config, &DEV)?;
        assert_eq!(block.residual_dropout(), mode);
        let x = Tensor::randn((2, 9, 40), &DEV)?;

        block.eval();
        let evaluated = block.forward(&x)?;
        block.train();
        let trained = block.forward(&x)?;
        assert_ne!(trained.as_slice(), evaluated.as_slice(), "{mode:?}");
    }
    Ok(())
}

#[test]
fn test_sequence_axis_keeps_windows_independent() -> Result<()> {
    let config = small_config().attention_axis(AttentionAxis::Sequence);
    let model = EegTransformer::new(config, &DEV)?;
    model.eval();
    let x = seeded_windows((3, 4, 200), 8)?;

    let batched = model.forward(&x)?;
    let alone = model.forward(&x.narrow(0, 0, 1)?)?;
    assert_slice_approx(&batched.as_slice()[..4], alone.as_slice(), 1e-4);
    Ok(())
}

#[test]
fn test_batch_axis_mixes_windows() -> Result<()> {
    let encoder = AttentionEncoderStack::new(&EegTransformerConfig::default().num_layers(1), &DEV)?;
    encoder.eval();
    let x = Tensor::randn((3, 5, 40), &DEV)?;

    let batched = encoder.forward(&x)?;
    let alone = encoder.forward(&x.narrow(0, 0, 1)?)?;
    assert_ne!(&batched.as_slice()[..5 * 40], alone.as_slice());
    Ok(())
}

// Dormant input path

#[test]
fn test_positional_table_values() -> Result<()> {
    let pe = PositionalEncoding::new(22, 40, &DEV)?;
    assert_eq!(pe.table().dims(), &[1, 22, 40]);
    let t = pe.table().as_slice();

    assert!(approx_eq(t[0], 0.0, 1e-7));
    assert!(approx_eq(t[1], 1.0, 1e-7));
    // position 1
    assert!(approx_eq(t[40], 1f32.sin(), 1e-6));
    assert!(approx_eq(t[41], 1f32.cos(), 1e-6));
    let freq = (-2.0 * 10000f64.ln() / 40.0).exp();
    assert!(approx_eq(t[42], freq.sin() as f32, 1e-6));
    assert!(approx_eq(t[43], freq.cos() as f32, 1e-6));
    Ok(())
}

#[test]
fn test_positional_apply_adds_prefix() -> Result<()> {
    let pe = PositionalEncoding::new(22, 8, &DEV)?;
    let y = pe.apply(&Tensor::zeros((2, 5, 8), &DEV)?)?;
    assert_eq!(y.dims(), &[2, 5, 8]);
    let prefix = pe.table().narrow(1, 0, 5)?;
    assert_eq!(&y.as_slice()[..40], prefix.as_slice());
    assert_eq!(&y.as_slice()[40..], prefix.as_slice());

    assert!(pe.apply(&Tensor::zeros((1, 23, 8), &DEV)?).is_err());
    Ok(())
}

#[test]
fn test_input_embedding_is_frozen() -> Result<()> {
    let embedding = InputEmbedding::new(100, 16, &DEV)?;
    assert_eq!(embedding.num_parameters(), 100 * 16 + 16);
    assert_eq!(embedding.trainable_params_count(), 0);
    let y = embedding.forward(&Tensor::randn((2, 4, 100), &DEV)?)?;
    assert_eq!(y.dims(), &[2, 4, 16]);
    Ok(())
}

#[test]
fn test_embed_input_shape() -> Result<()> {
    let model = EegTransformer::new(small_config(), &DEV)?;
    let x = seeded_windows((2, 4, 200), 9)?;
    assert_eq!(model.embed_input(&x)?.dims(), &[2, 4, 40]);
    assert_eq!(model.embed_input(&x.unsqueeze(1)?)?.dims(), &[2, 4, 40]);
    Ok(())
}

// Augmented batches through the model

#[test]
fn test_spliced_batch_feeds_model() -> Result<()> {
    let labels: Vec<usize> = (0..12).map(|i| i % 4).collect();
    let windows = seeded_windows((12, 22, 1125), 10)?.unsqueeze(1)?;
    let mut rng = StdRng::seed_from_u64(10);
    let batch = SegmentSplicer::default()
        .augment_with_rng(&windows, &labels, 8, &DEV, &mut rng)
        .map_err(|e| Error::msg(e.to_string()))?;

    let model = EegTransformer::new(EegTransformerConfig::default().num_layers(1), &DEV)?;
    let logits = model.forward(&batch.windows)?;
    assert_eq!(logits.dims(), &[8, 4]);
    Ok(())
}
