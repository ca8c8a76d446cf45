// Module trait — the interface every layer implements
//
// A layer is a plain struct holding its parameter tensors. `forward()` maps
// an input tensor to an output tensor; `parameters()` lists the tensors an
// optimizer would update.
//
// TRAIN / EVAL:
//
// Dropout and BatchNorm behave differently in training and evaluation. Their
// flag lives in a `Cell<bool>` so `set_training` works through `&self`;
// composite modules forward the call to every child.
//
// FROZEN PARAMETERS:
//
// `trainable_parameters()` defaults to `parameters()`. Layers whose weights
// must never be updated (the frozen input embedding) override it to return
// nothing, so parameter counts and any optimizer skip them.

use eegformer_core::{Result, Tensor};

/// The fundamental trait for all layers.
///
/// # Example
/// ```
/// use eegformer_core::{Device, Result, Tensor};
/// use eegformer_nn::{Linear, Module};
///
/// struct Probe {
///     linear: Linear,
/// }
///
/// impl Module for Probe {
///     fn forward(&self, x: &Tensor) -> Result<Tensor> {
///         self.linear.forward(x)?.silu()
///     }
///     fn parameters(&self) -> Vec<Tensor> {
///         self.linear.parameters()
///     }
/// }
///
/// let probe = Probe { linear: Linear::new(4, 2, true, &Device::Cpu)? };
/// assert_eq!(probe.num_parameters(), 10);
/// # Ok::<(), eegformer_core::Error>(())
/// ```
pub trait Module {
    /// Compute the output tensor from the input tensor.
    fn forward(&self, x: &Tensor) -> Result<Tensor>;

    /// All parameters owned by this module, frozen or not.
    fn parameters(&self) -> Vec<Tensor>;

    /// Parameters an optimizer is allowed to update.
    fn trainable_parameters(&self) -> Vec<Tensor> {
        self.parameters()
    }

    /// Set training or evaluation mode. Default is a no-op.
    fn set_training(&self, _training: bool) {}

    /// Whether the module is in training mode (default: true).
    fn is_training(&self) -> bool {
        true
    }

    fn train(&self) {
        self.set_training(true);
    }

    fn eval(&self) {
        self.set_training(false);
    }

    /// Total number of scalar parameters in this module.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.elem_count()).sum()
    }

    /// Number of scalar parameters that are trainable.
    fn trainable_params_count(&self) -> usize {
        self.trainable_parameters()
            .iter()
            .map(|p| p.elem_count())
            .sum()
    }

    /// Parameters with dotted names such as `"norm1.weight"`.
    ///
    /// The default uses positional indices (`param_0`, `param_1`, …).
    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.parameters()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (format!("param_{i}"), p))
            .collect()
    }
}

/// Prefix every name in `named` with `prefix.`.
pub fn prefixed(prefix: &str, named: Vec<(String, Tensor)>) -> Vec<(String, Tensor)> {
    named
        .into_iter()
        .map(|(k, v)| (format!("{prefix}.{k}"), v))
        .collect()
}
