// nn::init — parameter initialization
//
// The layers here follow the PyTorch defaults:
//
//   Linear / Conv2d weight   kaiming_uniform → U(-√(1/fan_in), √(1/fan_in))
//   Linear / Conv2d bias     U(-1/√fan_in, 1/√fan_in)
//   attention in-projection  xavier_uniform, biases zero
//
// Fans use the convolution convention: dims[0] = out, dims[1] = in, the
// remaining dims form the receptive field.

use eegformer_core::{Device, Result, Shape, Tensor};

/// `(fan_in, fan_out)` for a weight shape.
pub fn compute_fans(shape: &Shape) -> (f64, f64) {
    let dims = shape.dims();
    match dims.len() {
        0 => (1.0, 1.0),
        1 => (dims[0] as f64, dims[0] as f64),
        2 => (dims[1] as f64, dims[0] as f64),
        _ => {
            let receptive_field: usize = dims[2..].iter().product();
            (
                (dims[1] * receptive_field) as f64,
                (dims[0] * receptive_field) as f64,
            )
        }
    }
}

/// U(low, high).
pub fn uniform(shape: impl Into<Shape>, low: f64, high: f64, device: &Device) -> Result<Tensor> {
    Tensor::rand(shape, device)?.affine(high - low, low)
}

/// Kaiming uniform with `a = √5`, which reduces to U(-√(1/fan_in), √(1/fan_in)).
pub fn kaiming_uniform(shape: impl Into<Shape>, device: &Device) -> Result<Tensor> {
    let shape = shape.into();
    let (fan_in, _) = compute_fans(&shape);
    let bound = (1.0 / fan_in.max(1.0)).sqrt();
    uniform(shape, -bound, bound, device)
}

/// Bias companion of [`kaiming_uniform`]: U(-1/√fan_in, 1/√fan_in).
pub fn fan_in_bias(len: usize, fan_in: usize, device: &Device) -> Result<Tensor> {
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    uniform(len, -bound, bound, device)
}

/// Xavier (Glorot) uniform: U(-a, a) with `a = gain·√(6 / (fan_in + fan_out))`.
pub fn xavier_uniform(shape: impl Into<Shape>, gain: f64, device: &Device) -> Result<Tensor> {
    let shape = shape.into();
    let (fan_in, fan_out) = compute_fans(&shape);
    let a = gain * (6.0 / (fan_in + fan_out)).sqrt();
    uniform(shape, -a, a, device)
}
