// Dropout — regularization via random zeroing
//
// During training each element is zeroed with probability p and the
// survivors are scaled by 1/(1-p). In eval mode Dropout is the identity.
//
// The training flag uses Cell<bool> so set_training works through &self.

use std::cell::Cell;

use eegformer_core::{Error, Result, Tensor};

use crate::module::Module;

/// Applies dropout regularization.
pub struct Dropout {
    p: f64,
    training: Cell<bool>,
}

impl Dropout {
    /// Fails unless `p` is in `[0, 1)`.
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::msg(format!(
                "Dropout probability must be in [0, 1), got {}",
                p
            )));
        }
        Ok(Dropout {
            p,
            training: Cell::new(true),
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if !self.training.get() || self.p == 0.0 {
            return Ok(x.clone());
        }
        let p = self.p as f32;
        let scale = 1.0 / (1.0 - p);
        let keep = Tensor::rand(x.shape(), x.device())?.map(|u| if u >= p { scale } else { 0.0 });
        x.mul(&keep)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }

    fn set_training(&self, training: bool) {
        self.training.set(training);
    }

    fn is_training(&self) -> bool {
        self.training.get()
    }
}
