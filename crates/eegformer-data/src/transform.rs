// Transform — per-trial preprocessing pipeline
//
// Raw recordings arrive in volts. The preprocessing chain used for the
// motor-imagery data is:
//
//   ScaleSignal::microvolts()          V → µV
//   ExponentialMovingStandardize       running per-electrode z-scoring
//
// Band-pass filtering is expected to have happened upstream.

use crate::dataset::EegTrial;

/// A transform applied to each trial before batching.
pub trait Transform: Send + Sync {
    fn apply(&self, trial: EegTrial) -> EegTrial;
}

/// Multiply every sample by a constant.
#[derive(Debug, Clone)]
pub struct ScaleSignal {
    factor: f32,
}

impl ScaleSignal {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// Volts to microvolts.
    pub fn microvolts() -> Self {
        Self::new(1e6)
    }
}

impl Transform for ScaleSignal {
    fn apply(&self, mut trial: EegTrial) -> EegTrial {
        for v in &mut trial.signal {
            *v *= self.factor;
        }
        trial
    }
}

/// Parameters of [`ExponentialMovingStandardize`].
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizeConfig {
    /// Weight of the newest sample in the exponential moving averages.
    pub factor_new: f64,
    /// Leading samples standardized with their plain block mean/std instead.
    pub init_block_size: Option<usize>,
    /// Lower bound on the standard deviation divisor.
    pub eps: f64,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            factor_new: 1e-3,
            init_block_size: Some(1000),
            eps: 1e-4,
        }
    }
}

impl StandardizeConfig {
    pub fn factor_new(mut self, f: f64) -> Self {
        self.factor_new = f;
        self
    }

    pub fn init_block_size(mut self, n: Option<usize>) -> Self {
        self.init_block_size = n;
        self
    }

    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }
}

/// Exponential moving standardization, independently per electrode.
///
/// With `a = factor_new`, bias-corrected moving averages are
///
/// ```text
/// m_t = Σ (1-a)^i x_{t-i} / Σ (1-a)^i
/// d_t = x_t - m_t
/// v_t = Σ (1-a)^i d_{t-i}² / Σ (1-a)^i
/// y_t = d_t / max(eps, √v_t)
/// ```
///
/// and the first `init_block_size` outputs are replaced by
/// `(x - mean) / max(eps, std)` over that block (population std).
#[derive(Debug, Clone, Default)]
pub struct ExponentialMovingStandardize {
    config: StandardizeConfig,
}

impl ExponentialMovingStandardize {
    pub fn new(config: StandardizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StandardizeConfig {
        &self.config
    }

    fn standardize_channel(&self, x: &mut [f32]) {
        let decay = 1.0 - self.config.factor_new;
        let eps = self.config.eps;

        let mut demeaned = Vec::with_capacity(x.len());
        let (mut num, mut den) = (0.0f64, 0.0f64);
        for &v in x.iter() {
            num = v as f64 + decay * num;
            den = 1.0 + decay * den;
            demeaned.push(v as f64 - num / den);
        }

        let block = self.config.init_block_size.map(|b| b.min(x.len()));
        let init = block.filter(|&b| b > 0).map(|b| {
            let mean = x[..b].iter().map(|&v| v as f64).sum::<f64>() / b as f64;
            let var = x[..b]
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / b as f64;
            (b, mean, var.sqrt().max(eps))
        });

        let (mut num, mut den) = (0.0f64, 0.0f64);
        for (t, d) in demeaned.into_iter().enumerate() {
            num = d * d + decay * num;
            den = 1.0 + decay * den;
            let ewm_std = (num / den).sqrt().max(eps);
            x[t] = match init {
                Some((b, mean, std)) if t < b => ((x[t] as f64 - mean) / std) as f32,
                _ => (d / ewm_std) as f32,
            };
        }
    }
}

impl Transform for ExponentialMovingStandardize {
    fn apply(&self, mut trial: EegTrial) -> EegTrial {
        for c in 0..trial.n_channels {
            self.standardize_channel(trial.channel_mut(c));
        }
        trial
    }
}

/// Chain multiple transforms.
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }
}

impl Transform for Compose {
    fn apply(&self, mut trial: EegTrial) -> EegTrial {
        for t in &self.transforms {
            trial = t.apply(trial);
        }
        trial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_to_microvolts() {
        let t = EegTrial::new(vec![1e-6, -2e-6], 1, 2, 0).unwrap();
        let out = ScaleSignal::microvolts().apply(t);
        assert!((out.signal[0] - 1.0).abs() < 1e-4);
        assert!((out.signal[1] + 2.0).abs() < 1e-4);
    }

    #[test]
    fn init_block_is_zscored() {
        let ems = ExponentialMovingStandardize::new(StandardizeConfig::default().init_block_size(Some(4)));
        let t = EegTrial::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 1, 6, 0).unwrap();
        let out = ems.apply(t);
        let block = &out.signal[..4];
        let mean: f32 = block.iter().sum::<f32>() / 4.0;
        let var: f32 = block.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn first_sample_without_init_block_is_zero() {
        // m_0 = x_0, so d_0 = 0 regardless of the value
        let ems = ExponentialMovingStandardize::new(StandardizeConfig::default().init_block_size(None));
        let t = EegTrial::new(vec![7.0, 9.0, 9.0, 9.0], 2, 2, 0).unwrap();
        let out = ems.apply(t);
        assert_eq!(out.signal[0], 0.0);
        assert_eq!(out.signal[2], 0.0);
        assert!(out.signal[1] > 0.0);
    }

    #[test]
    fn compose_runs_in_order() {
        let chain = Compose::new(vec![
            Box::new(ScaleSignal::new(2.0)),
            Box::new(ScaleSignal::new(-1.0)),
        ]);
        let t = EegTrial::new(vec![1.5], 1, 1, 0).unwrap();
        assert_eq!(chain.apply(t).signal, vec![-3.0]);
    }
}
