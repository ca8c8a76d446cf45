// BatchNorm2d — per-channel normalization across the batch
//
// FORMULA (training mode):
//   x_hat = (x - mean_batch) / sqrt(var_batch + ε)
//   y = γ * x_hat + β
//
// mean_batch and var_batch are computed per channel over (N, H, W); the
// normalization uses the biased variance.
//
// RUNNING STATISTICS:
//   running_mean = (1 - momentum) * running_mean + momentum * mean_batch
//   running_var  = (1 - momentum) * running_var  + momentum * var_unbiased
//
// where var_unbiased = var_batch * n / (n - 1) with n = N*H*W. Eval mode
// normalizes with the running statistics instead of batch statistics.
//
// SHAPES:
//   Input / output: [N, C, H, W]
//   γ, β:           [C]

use std::cell::{Cell, RefCell};

use eegformer_core::{Device, Error, Result, Tensor};
use tracing::trace;

use crate::module::Module;

/// 2D Batch Normalization layer for convolutional feature maps.
pub struct BatchNorm2d {
    weight: Tensor,
    bias: Tensor,
    running_mean: RefCell<Vec<f32>>,
    running_var: RefCell<Vec<f32>>,
    num_features: usize,
    eps: f64,
    momentum: f64,
    training: Cell<bool>,
}

impl BatchNorm2d {
    /// `eps` is typically 1e-5 and `momentum` 0.1.
    pub fn new(num_features: usize, eps: f64, momentum: f64, device: &Device) -> Result<Self> {
        Ok(BatchNorm2d {
            weight: Tensor::ones(num_features, device)?,
            bias: Tensor::zeros(num_features, device)?,
            running_mean: RefCell::new(vec![0.0; num_features]),
            running_var: RefCell::new(vec![1.0; num_features]),
            num_features,
            eps,
            momentum,
            training: Cell::new(true),
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn running_mean(&self) -> Vec<f32> {
        self.running_mean.borrow().clone()
    }

    pub fn running_var(&self) -> Vec<f32> {
        self.running_var.borrow().clone()
    }

    fn update_running_stats(&self, mean: &[f32], var: &[f32], count: usize) {
        let m = self.momentum as f32;
        let correction = if count > 1 {
            count as f32 / (count - 1) as f32
        } else {
            1.0
        };
        let mut rm = self.running_mean.borrow_mut();
        let mut rv = self.running_var.borrow_mut();
        for c in 0..self.num_features {
            rm[c] = (1.0 - m) * rm[c] + m * mean[c];
            rv[c] = (1.0 - m) * rv[c] + m * var[c] * correction;
        }
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (n, c, h, w) = x.shape().dims4()?;
        if c != self.num_features {
            return Err(Error::msg(format!(
                "BatchNorm2d: expected {} channels, got {}",
                self.num_features, c
            )));
        }

        let (mean, var) = if self.training.get() {
            // [N, C, H, W] → [C, N*H*W] so each row holds one channel.
            let per_channel = x.reshape((n, c, h * w))?.transpose(0, 1)?.reshape((c, n * h * w))?;
            let mean = per_channel.mean(1, false)?;
            let var = per_channel.var(1, false)?;
            self.update_running_stats(mean.as_slice(), var.as_slice(), n * h * w);
            trace!(channels = c, count = n * h * w, "batchnorm batch statistics");
            (mean, var)
        } else {
            let device = x.device();
            (
                Tensor::from_slice(&self.running_mean.borrow(), c, device)?,
                Tensor::from_slice(&self.running_var.borrow(), c, device)?,
            )
        };

        let mean = mean.reshape((1, c, 1, 1))?;
        let std = var.affine(1.0, self.eps)?.sqrt()?.reshape((1, c, 1, 1))?;
        let gamma = self.weight.reshape((1, c, 1, 1))?;
        let beta = self.bias.reshape((1, c, 1, 1))?;

        x.sub(&mean)?.div(&std)?.mul(&gamma)?.add(&beta)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("bias".to_string(), self.bias.clone()),
        ]
    }

    fn set_training(&self, training: bool) {
        self.training.set(training);
    }

    fn is_training(&self) -> bool {
        self.training.get()
    }
}
