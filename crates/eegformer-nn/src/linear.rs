// Linear — fully-connected layer: y = xW^T + b
//
// PARAMETER SHAPES:
//
//   weight: [out_features, in_features]
//   bias:   [out_features]   broadcast over every leading dim
//
// COMPUTATION:
//
//   Input  [..., in_features] is flattened to [rows, in_features],
//   multiplied by weight^T, and reshaped back to [..., out_features].
//   The encoder feeds [N, L, E] sequences straight through.

use eegformer_core::{Device, Error, Result, Tensor};

use crate::init;
use crate::module::Module;

/// A fully-connected (dense) layer.
///
/// # Examples
/// ```
/// use eegformer_core::{Device, Tensor};
/// use eegformer_nn::{Linear, Module};
///
/// let ff = Linear::new(40, 16, true, &Device::Cpu)?;
/// let x = Tensor::rand((8, 72, 40), &Device::Cpu)?;
/// assert_eq!(ff.forward(&x)?.dims(), &[8, 72, 16]);
/// # Ok::<(), eegformer_core::Error>(())
/// ```
pub struct Linear {
    weight: Tensor,
    bias: Option<Tensor>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a Linear layer with PyTorch's default initialization.
    pub fn new(
        in_features: usize,
        out_features: usize,
        use_bias: bool,
        device: &Device,
    ) -> Result<Self> {
        let weight = init::kaiming_uniform((out_features, in_features), device)?;
        let bias = if use_bias {
            Some(init::fan_in_bias(out_features, in_features, device)?)
        } else {
            None
        };
        Ok(Linear {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    /// Build from existing tensors (weight `[out, in]`, bias `[out]`).
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let dims = weight.dims();
        if dims.len() != 2 {
            return Err(Error::msg(format!(
                "Linear weight must be 2D, got shape {}",
                weight.shape()
            )));
        }
        let (out_features, in_features) = (dims[0], dims[1]);
        if let Some(b) = &bias {
            if b.elem_count() != out_features {
                return Err(Error::msg(format!(
                    "Linear bias must have {} elements, got shape {}",
                    out_features,
                    b.shape()
                )));
            }
        }
        Ok(Linear {
            weight,
            bias: bias.map(|b| b.reshape(out_features)).transpose()?,
            in_features,
            out_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

impl Module for Linear {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dims = x.dims();
        let last = dims.last().copied().unwrap_or(0);
        if last != self.in_features {
            return Err(Error::msg(format!(
                "Linear: expected last dim {}, got input shape {}",
                self.in_features,
                x.shape()
            )));
        }
        let rows = x.elem_count() / self.in_features.max(1);
        let mut out_dims = dims.to_vec();
        if let Some(d) = out_dims.last_mut() {
            *d = self.out_features;
        }

        let x2d = x.reshape((rows, self.in_features))?;
        let mut y = x2d.matmul(&self.weight.t()?)?;
        if let Some(b) = &self.bias {
            y = y.add(b)?;
        }
        y.reshape(out_dims)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weight.clone()];
        if let Some(b) = &self.bias {
            params.push(b.clone());
        }
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = vec![("weight".to_string(), self.weight.clone())];
        if let Some(b) = &self.bias {
            named.push(("bias".to_string(), b.clone()));
        }
        named
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tensors_computes_affine_map() {
        let dev = Device::Cpu;
        let w = Tensor::from_vec(vec![1.0, 2.0, 0.0, -1.0], (2, 2), &dev).unwrap();
        let b = Tensor::from_vec(vec![0.5, 1.0], 2, &dev).unwrap();
        let lin = Linear::from_tensors(w, Some(b)).unwrap();
        let x = Tensor::from_vec(vec![3.0, 4.0], (1, 1, 2), &dev).unwrap();
        let y = lin.forward(&x).unwrap();
        assert_eq!(y.dims(), &[1, 1, 2]);
        assert_eq!(y.to_vec(), vec![11.5, -3.0]);
    }

    #[test]
    fn rejects_wrong_width() {
        let lin = Linear::new(4, 2, true, &Device::Cpu).unwrap();
        let x = Tensor::zeros((3, 5), &Device::Cpu).unwrap();
        assert!(lin.forward(&x).is_err());
    }
}
