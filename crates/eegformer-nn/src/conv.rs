// Conv2d / AvgPool2d — the layers of the temporal-spatial featurizer
//
// EEG windows enter the featurizer as single-plane "images" [N, 1, C, T]:
// rows are electrodes, columns are time samples. A (1 × k) kernel filters
// each electrode over time; a (C × 1) kernel mixes all electrodes at one
// time step.
//
// SHAPES:
//   Input:  [N, C_in, H, W]
//   Weight: [C_out, C_in, kH, kW]
//   Bias:   [C_out]
//   Output: [N, C_out, H_out, W_out]
//
//   H_out = (H + 2*pH - kH) / sH + 1
//   W_out = (W + 2*pW - kW) / sW + 1
//
// The heavy lifting is im2col + GEMM in `Tensor::conv2d`.

use eegformer_core::{Device, Error, Result, Tensor};

use crate::init;
use crate::module::Module;

/// 2D convolution layer.
pub struct Conv2d {
    weight: Tensor,
    bias: Option<Tensor>,
    in_channels: usize,
    out_channels: usize,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
}

impl Conv2d {
    /// Create a Conv2d layer with PyTorch's default initialization.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        use_bias: bool,
        device: &Device,
    ) -> Result<Self> {
        if kernel_size.contains(&0) || stride.contains(&0) {
            return Err(Error::msg(format!(
                "Conv2d: kernel {:?} and stride {:?} must be positive",
                kernel_size, stride
            )));
        }
        let [kh, kw] = kernel_size;
        let fan_in = in_channels * kh * kw;
        let weight = init::kaiming_uniform((out_channels, in_channels, kh, kw), device)?;
        let bias = if use_bias {
            Some(init::fan_in_bias(out_channels, fan_in, device)?)
        } else {
            None
        };
        Ok(Conv2d {
            weight,
            bias,
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }

    pub fn stride(&self) -> [usize; 2] {
        self.stride
    }

    pub fn padding(&self) -> [usize; 2] {
        self.padding
    }

    /// Output spatial size for an `h × w` input.
    pub fn output_size(&self, h: usize, w: usize) -> Option<(usize, usize)> {
        conv_out(h, self.kernel_size[0], self.stride[0], self.padding[0])
            .zip(conv_out(w, self.kernel_size[1], self.stride[1], self.padding[1]))
    }
}

impl Module for Conv2d {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.conv2d(&self.weight, self.bias.as_ref(), self.stride, self.padding)
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

/// 2D average pooling. Padded positions count toward the divisor.
pub struct AvgPool2d {
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
}

impl AvgPool2d {
    pub fn new(kernel_size: [usize; 2], stride: [usize; 2], padding: [usize; 2]) -> Self {
        AvgPool2d {
            kernel_size,
            stride,
            padding,
        }
    }

    /// Output spatial size for an `h × w` input.
    pub fn output_size(&self, h: usize, w: usize) -> Option<(usize, usize)> {
        conv_out(h, self.kernel_size[0], self.stride[0], self.padding[0])
            .zip(conv_out(w, self.kernel_size[1], self.stride[1], self.padding[1]))
    }
}

impl Module for AvgPool2d {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.avg_pool2d(self.kernel_size, self.stride, self.padding)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

/// Sliding-window output length, `None` when the kernel does not fit.
fn conv_out(len: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = len + 2 * padding;
    if stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}
