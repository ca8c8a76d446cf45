use std::sync::Arc;

use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::shape::Shape;

// Tensor — the n-dimensional f32 array every layer consumes and produces
//
// MEMORY MODEL:
//
//   Data lives in an `Arc<Vec<f32>>`, always contiguous and row-major.
//   Cloning a tensor or reshaping it shares the buffer; every other op
//   (transpose, narrow, cat, arithmetic) writes a fresh buffer. There are
//   no strided views, so kernels can index with plain row-major math.
//
// IMMUTABILITY:
//
//   Ops never mutate their inputs. Layer state that changes across calls
//   (BatchNorm running statistics, train/eval flags) lives in the layers,
//   not in tensors.
//
// DEVICE:
//
//   Each tensor records the `Device` it was allocated for. Binary ops check
//   that both operands agree and fail with `Error::DeviceMismatch` otherwise.

/// An n-dimensional array of `f32` values on a specific device.
///
/// # Example
/// ```
/// use eegformer_core::{Device, Tensor};
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], (2, 2), &Device::Cpu)?;
/// let b = Tensor::ones((2, 2), &Device::Cpu)?;
/// let c = a.add(&b)?;
/// assert_eq!(c.to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
/// # Ok::<(), eegformer_core::Error>(())
/// ```
#[derive(Clone)]
pub struct Tensor {
    data: Arc<Vec<f32>>,
    shape: Shape,
    device: Device,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tensor(shape={}, device={})", self.shape, self.device)
    }
}

impl Tensor {
    fn from_parts(data: Vec<f32>, shape: Shape, device: Device) -> Self {
        debug_assert_eq!(data.len(), shape.elem_count());
        Tensor {
            data: Arc::new(data),
            shape,
            device,
        }
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn dim(&self, d: usize) -> Result<usize> {
        self.shape.dim(d)
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Borrow the contiguous row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy the data out into a `Vec<f32>`.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.as_ref().clone()
    }

    /// Extract the single value of a one-element tensor.
    pub fn to_scalar(&self) -> Result<f32> {
        if self.elem_count() != 1 {
            return Err(Error::msg(format!(
                "to_scalar: tensor has shape {}",
                self.shape
            )));
        }
        Ok(self.data[0])
    }

    /// Move the tensor to `device`. Host-only today, so this only retags.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Tensor {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            device: *device,
        })
    }

    fn same_device(&self, rhs: &Self) -> Result<()> {
        if self.device != rhs.device {
            return Err(Error::DeviceMismatch {
                lhs: self.device,
                rhs: rhs.device,
            });
        }
        Ok(())
    }

    // Creation

    pub fn zeros(shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        Self::full(shape, 0.0, device)
    }

    pub fn ones(shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        Self::full(shape, 1.0, device)
    }

    pub fn full(shape: impl Into<Shape>, val: f32, device: &Device) -> Result<Self> {
        let shape = shape.into();
        Ok(Self::from_parts(
            vec![val; shape.elem_count()],
            shape,
            *device,
        ))
    }

    /// Wrap an owned buffer; its length must match the shape.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        let shape = shape.into();
        let expected = shape.elem_count();
        if data.len() != expected {
            return Err(Error::ElementCountMismatch {
                shape,
                expected,
                got: data.len(),
            });
        }
        Ok(Self::from_parts(data, shape, *device))
    }

    pub fn from_slice(data: &[f32], shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape, device)
    }

    pub fn zeros_like(other: &Self) -> Result<Self> {
        Self::zeros(other.shape.clone(), &other.device)
    }

    /// Uniform samples in [0, 1) from the thread-local RNG.
    pub fn rand(shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        Self::rand_with(shape, &mut rand::thread_rng(), device)
    }

    /// Uniform samples in [0, 1) from a caller-supplied RNG.
    pub fn rand_with<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let data = (0..shape.elem_count()).map(|_| rng.gen::<f32>()).collect();
        Ok(Self::from_parts(data, shape, *device))
    }

    /// Standard normal samples from the thread-local RNG.
    pub fn randn(shape: impl Into<Shape>, device: &Device) -> Result<Self> {
        Self::randn_with(shape, &mut rand::thread_rng(), device)
    }

    /// Standard normal samples from a caller-supplied RNG.
    pub fn randn_with<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        rng: &mut R,
        device: &Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let data = (0..shape.elem_count())
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        Ok(Self::from_parts(data, shape, *device))
    }

    // Shape manipulation

    /// Reinterpret the buffer with a new shape (shares storage).
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        if new_shape.elem_count() != self.elem_count() {
            return Err(Error::ReshapeElementMismatch {
                src: self.elem_count(),
                dst: new_shape.elem_count(),
                dst_shape: new_shape,
            });
        }
        Ok(Tensor {
            data: Arc::clone(&self.data),
            shape: new_shape,
            device: self.device,
        })
    }

    /// Insert a size-1 dimension at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        if dim > self.rank() {
            return Err(Error::DimOutOfRange {
                dim,
                rank: self.rank(),
            });
        }
        let mut dims = self.dims().to_vec();
        dims.insert(dim, 1);
        self.reshape(dims)
    }

    /// Remove a size-1 dimension at `dim`.
    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        let size = self.dim(dim)?;
        if size != 1 {
            return Err(Error::msg(format!(
                "squeeze: dim {} has size {}, expected 1",
                dim, size
            )));
        }
        let mut dims = self.dims().to_vec();
        dims.remove(dim);
        self.reshape(dims)
    }

    /// Collapse dims `start_dim..=end_dim` into one.
    pub fn flatten(&self, start_dim: usize, end_dim: usize) -> Result<Self> {
        let rank = self.rank();
        if end_dim >= rank || start_dim > end_dim {
            return Err(Error::msg(format!(
                "flatten: invalid range {}..={} for rank {}",
                start_dim, end_dim, rank
            )));
        }
        let dims = self.dims();
        let mut new_dims = dims[..start_dim].to_vec();
        new_dims.push(dims[start_dim..=end_dim].iter().product());
        new_dims.extend_from_slice(&dims[end_dim + 1..]);
        self.reshape(new_dims)
    }

    /// Reorder dimensions; `axes` must be a permutation of `0..rank`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        if axes.len() != rank
            || axes
                .iter()
                .any(|&a| a >= rank || std::mem::replace(&mut seen[a], true))
        {
            return Err(Error::msg(format!(
                "permute: {:?} is not a permutation of {} dims",
                axes, rank
            )));
        }

        let dims = self.dims();
        let src_strides = self.shape.stride_contiguous();
        let out_dims: Vec<usize> = axes.iter().map(|&a| dims[a]).collect();
        let strides: Vec<usize> = axes.iter().map(|&a| src_strides[a]).collect();
        let out = gather_strided(&self.data, &out_dims, &strides);
        Ok(Self::from_parts(out, Shape::new(out_dims), self.device))
    }

    /// Swap two dimensions.
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let rank = self.rank();
        if dim0 >= rank || dim1 >= rank {
            return Err(Error::DimOutOfRange {
                dim: dim0.max(dim1),
                rank,
            });
        }
        let mut axes: Vec<usize> = (0..rank).collect();
        axes.swap(dim0, dim1);
        self.permute(&axes)
    }

    /// Transpose the last two dimensions.
    pub fn t(&self) -> Result<Self> {
        if self.rank() < 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: self.rank(),
            });
        }
        self.transpose(self.rank() - 2, self.rank() - 1)
    }

    /// Take `len` entries starting at `start` along `dim`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        let dim_size = self.dim(dim)?;
        if start + len > dim_size {
            return Err(Error::NarrowOutOfBounds {
                dim,
                start,
                len,
                dim_size,
            });
        }
        let (outer, _, inner) = split_at_dim(self.dims(), dim);
        let mut out = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let base = (o * dim_size + start) * inner;
            out.extend_from_slice(&self.data[base..base + len * inner]);
        }
        let mut dims = self.dims().to_vec();
        dims[dim] = len;
        Ok(Self::from_parts(out, Shape::new(dims), self.device))
    }

    /// Gather entries along `dim` in the order given by `indices`.
    pub fn index_select(&self, dim: usize, indices: &[usize]) -> Result<Self> {
        let dim_size = self.dim(dim)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= dim_size) {
            return Err(Error::msg(format!(
                "index_select: index {} out of range for dim {} of size {}",
                bad, dim, dim_size
            )));
        }
        let (outer, _, inner) = split_at_dim(self.dims(), dim);
        let mut out = Vec::with_capacity(outer * indices.len() * inner);
        for o in 0..outer {
            for &idx in indices {
                let base = (o * dim_size + idx) * inner;
                out.extend_from_slice(&self.data[base..base + inner]);
            }
        }
        let mut dims = self.dims().to_vec();
        dims[dim] = indices.len();
        Ok(Self::from_parts(out, Shape::new(dims), self.device))
    }

    /// Concatenate tensors along a dimension.
    ///
    /// All tensors must share rank, device and every size except `dim`.
    pub fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::msg("cat: empty tensor list"))?;
        let rank = first.rank();
        if dim >= rank {
            return Err(Error::DimOutOfRange { dim, rank });
        }

        for (i, t) in tensors.iter().enumerate().skip(1) {
            first.same_device(t)?;
            if t.rank() != rank {
                return Err(Error::msg(format!(
                    "cat: tensor {} has rank {} but expected {}",
                    i,
                    t.rank(),
                    rank
                )));
            }
            for d in (0..rank).filter(|&d| d != dim) {
                if t.dims()[d] != first.dims()[d] {
                    return Err(Error::msg(format!(
                        "cat: tensor {} has size {} at dim {} but expected {}",
                        i,
                        t.dims()[d],
                        d,
                        first.dims()[d]
                    )));
                }
            }
        }

        let cat_size: usize = tensors.iter().map(|t| t.dims()[dim]).sum();
        let mut out_dims = first.dims().to_vec();
        out_dims[dim] = cat_size;
        let (outer, _, inner) = split_at_dim(first.dims(), dim);

        let mut out = Vec::with_capacity(outer * cat_size * inner);
        for o in 0..outer {
            for t in tensors {
                let chunk = t.dims()[dim] * inner;
                out.extend_from_slice(&t.data[o * chunk..(o + 1) * chunk]);
            }
        }
        Ok(Self::from_parts(out, Shape::new(out_dims), first.device))
    }

    // Element-wise ops

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        let out = self.data.iter().map(|&v| f(v)).collect();
        Self::from_parts(out, self.shape.clone(), self.device)
    }

    fn binary_map(&self, rhs: &Self, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        self.same_device(rhs)?;
        if self.shape == rhs.shape {
            let out = self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Ok(Self::from_parts(out, self.shape.clone(), self.device));
        }

        let out_shape = Shape::broadcast_shape(&self.shape, &rhs.shape)?;
        let ls = self.shape.broadcast_strides(&out_shape);
        let rs = rhs.shape.broadcast_strides(&out_shape);
        let dims = out_shape.dims();
        let n = out_shape.elem_count();

        let mut out = Vec::with_capacity(n);
        let mut index = vec![0usize; dims.len()];
        let (mut lo, mut ro) = (0usize, 0usize);
        for _ in 0..n {
            out.push(f(self.data[lo], rhs.data[ro]));
            for d in (0..dims.len()).rev() {
                index[d] += 1;
                lo += ls[d];
                ro += rs[d];
                if index[d] < dims[d] {
                    break;
                }
                lo -= ls[d] * dims[d];
                ro -= rs[d] * dims[d];
                index[d] = 0;
            }
        }
        Ok(Self::from_parts(out, out_shape, self.device))
    }

    /// Element-wise addition with broadcasting.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary_map(rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary_map(rhs, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary_map(rhs, |a, b| a * b)
    }

    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary_map(rhs, |a, b| a / b)
    }

    /// `x * mul + add`, element-wise.
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self> {
        let (mul, add) = (mul as f32, add as f32);
        Ok(self.map(|v| v * mul + add))
    }

    pub fn exp(&self) -> Result<Self> {
        Ok(self.map(f32::exp))
    }

    pub fn sqrt(&self) -> Result<Self> {
        Ok(self.map(f32::sqrt))
    }

    pub fn square(&self) -> Result<Self> {
        Ok(self.map(|v| v * v))
    }

    pub fn powf(&self, exponent: f64) -> Result<Self> {
        let e = exponent as f32;
        Ok(self.map(|v| v.powf(e)))
    }

    pub fn sigmoid(&self) -> Result<Self> {
        Ok(self.map(sigmoid))
    }

    /// SiLU / swish: `x * sigmoid(x)`.
    pub fn silu(&self) -> Result<Self> {
        Ok(self.map(|v| v * sigmoid(v)))
    }

    // Reductions

    fn reduce_dim(
        &self,
        dim: usize,
        keep_dim: bool,
        init: f32,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<Self> {
        let len = self.dim(dim)?;
        let (outer, _, inner) = split_at_dim(self.dims(), dim);
        let mut out = vec![init; outer * inner];
        for o in 0..outer {
            let acc = &mut out[o * inner..(o + 1) * inner];
            for k in 0..len {
                let base = (o * len + k) * inner;
                for (a, &v) in acc.iter_mut().zip(&self.data[base..base + inner]) {
                    *a = f(*a, v);
                }
            }
        }
        let mut dims = self.dims().to_vec();
        if keep_dim {
            dims[dim] = 1;
        } else {
            dims.remove(dim);
        }
        Ok(Self::from_parts(out, Shape::new(dims), self.device))
    }

    pub fn sum(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        self.reduce_dim(dim, keep_dim, 0.0, |a, b| a + b)
    }

    pub fn mean(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        let len = self.dim(dim)?;
        if len == 0 {
            return Err(Error::msg(format!("mean over empty dim {}", dim)));
        }
        self.sum(dim, keep_dim)?.affine(1.0 / len as f64, 0.0)
    }

    pub fn max(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        self.reduce_dim(dim, keep_dim, f32::NEG_INFINITY, f32::max)
    }

    /// Biased variance: `mean((x - mean(x))²)`.
    pub fn var(&self, dim: usize, keep_dim: bool) -> Result<Self> {
        let mu = self.mean(dim, true)?;
        self.sub(&mu)?.square()?.mean(dim, keep_dim)
    }

    /// Mean of all elements.
    pub fn mean_all(&self) -> Result<f32> {
        if self.data.is_empty() {
            return Err(Error::msg("mean_all of an empty tensor"));
        }
        Ok(self.data.iter().sum::<f32>() / self.data.len() as f32)
    }

    /// Index of the maximum along `dim`, one entry per remaining position.
    pub fn argmax(&self, dim: usize) -> Result<Vec<usize>> {
        let len = self.dim(dim)?;
        let (outer, _, inner) = split_at_dim(self.dims(), dim);
        let mut out = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            for i in 0..inner {
                let mut best = 0usize;
                let mut best_val = f32::NEG_INFINITY;
                for k in 0..len {
                    let v = self.data[(o * len + k) * inner + i];
                    if v > best_val {
                        best_val = v;
                        best = k;
                    }
                }
                out.push(best);
            }
        }
        Ok(out)
    }

    /// Numerically stable softmax along `dim`.
    pub fn softmax(&self, dim: usize) -> Result<Self> {
        let max_val = self.max(dim, true)?;
        let exp_x = self.sub(&max_val)?.exp()?;
        let sum_exp = exp_x.sum(dim, true)?;
        exp_x.div(&sum_exp)
    }

    // Linear algebra

    /// Matrix multiplication over the last two dims.
    ///
    /// - [m, k] @ [k, n] → [m, n]
    /// - [..., m, k] @ [..., k, n] → [..., m, n] (same batch dims)
    /// - [..., m, k] @ [k, n] → [..., m, n] (rhs shared across the batch)
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        self.same_device(rhs)?;
        if self.rank() < 2 || rhs.rank() < 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: self.rank().min(rhs.rank()),
            });
        }
        let ld = self.dims();
        let rd = rhs.dims();
        let (m, k1) = (ld[ld.len() - 2], ld[ld.len() - 1]);
        let (k2, n) = (rd[rd.len() - 2], rd[rd.len() - 1]);
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }
        let batch_dims = &ld[..ld.len() - 2];
        let shared_rhs = rhs.rank() == 2;
        if !shared_rhs && &rd[..rd.len() - 2] != batch_dims {
            return Err(Error::msg(format!(
                "matmul: batch dims {:?} and {:?} differ",
                batch_dims,
                &rd[..rd.len() - 2]
            )));
        }

        let batch: usize = batch_dims.iter().product();
        let mut out_dims = batch_dims.to_vec();
        out_dims.push(m);
        out_dims.push(n);
        let mut out = vec![0.0f32; batch * m * n];

        if !out.is_empty() {
            let (a, b) = (self.as_slice(), rhs.as_slice());
            out.par_chunks_mut(m * n).enumerate().for_each(|(bi, c)| {
                let a = &a[bi * m * k1..(bi + 1) * m * k1];
                let b = if shared_rhs {
                    b
                } else {
                    &b[bi * k1 * n..(bi + 1) * k1 * n]
                };
                gemm(a, b, c, m, n, k1);
            });
        }
        Ok(Self::from_parts(out, Shape::new(out_dims), self.device))
    }

    // Convolution and pooling

    /// 2D convolution on `[N, C_in, H, W]` with weight `[C_out, C_in, kH, kW]`.
    ///
    /// Output `[N, C_out, H_out, W_out]` with
    /// `H_out = (H + 2*pH - kH) / sH + 1`. Samples are processed in
    /// parallel, each via im2col + GEMM.
    pub fn conv2d(
        &self,
        weight: &Self,
        bias: Option<&Self>,
        stride: [usize; 2],
        padding: [usize; 2],
    ) -> Result<Self> {
        self.same_device(weight)?;
        let (n, c_in, h, w) = self.shape.dims4()?;
        let (c_out, wc_in, kh, kw) = weight.shape.dims4()?;
        if c_in != wc_in {
            return Err(Error::msg(format!(
                "conv2d: input channels {} != weight channels {}",
                c_in, wc_in
            )));
        }
        if let Some(b) = bias {
            self.same_device(b)?;
            if b.elem_count() != c_out {
                return Err(Error::ShapeMismatch {
                    expected: Shape::from(c_out),
                    got: b.shape.clone(),
                });
            }
        }

        let [sh, sw] = stride;
        let [ph, pw] = padding;
        if sh == 0 || sw == 0 {
            return Err(Error::msg("conv2d: stride must be positive"));
        }
        if h + 2 * ph < kh || w + 2 * pw < kw {
            return Err(Error::msg(format!(
                "conv2d: kernel [{}, {}] larger than padded input [{}, {}]",
                kh,
                kw,
                h + 2 * ph,
                w + 2 * pw
            )));
        }

        let h_out = (h + 2 * ph - kh) / sh + 1;
        let w_out = (w + 2 * pw - kw) / sw + 1;
        let geom = ConvGeometry {
            c_in,
            h,
            w,
            kh,
            kw,
            sh,
            sw,
            ph,
            pw,
            h_out,
            w_out,
        };

        let col_rows = c_in * kh * kw;
        let col_cols = h_out * w_out;
        let sample_in = c_in * h * w;
        let sample_out = c_out * col_cols;
        let mut out = vec![0.0f32; n * sample_out];

        if !out.is_empty() {
            let input = self.as_slice();
            let wdata = weight.as_slice();
            let bdata = bias.map(|b| b.as_slice());
            out.par_chunks_mut(sample_out)
                .enumerate()
                .for_each(|(ni, dst)| {
                    let mut columns = vec![0.0f32; col_rows * col_cols];
                    im2col(
                        &input[ni * sample_in..(ni + 1) * sample_in],
                        &geom,
                        &mut columns,
                    );
                    gemm(wdata, &columns, dst, c_out, col_cols, col_rows);
                    if let Some(bd) = bdata {
                        for (row, &b) in dst.chunks_mut(col_cols).zip(bd) {
                            row.iter_mut().for_each(|v| *v += b);
                        }
                    }
                });
        }

        Ok(Self::from_parts(
            out,
            Shape::new(vec![n, c_out, h_out, w_out]),
            self.device,
        ))
    }

    /// 2D average pooling on `[N, C, H, W]`.
    ///
    /// Padded positions count toward the divisor (the window area is always
    /// `kH * kW`).
    pub fn avg_pool2d(
        &self,
        kernel_size: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
    ) -> Result<Self> {
        let (n, c, h, w) = self.shape.dims4()?;
        let [kh, kw] = kernel_size;
        let [sh, sw] = stride;
        let [ph, pw] = padding;
        if kh == 0 || kw == 0 || sh == 0 || sw == 0 {
            return Err(Error::msg("avg_pool2d: kernel and stride must be positive"));
        }
        if h + 2 * ph < kh || w + 2 * pw < kw {
            return Err(Error::msg(format!(
                "avg_pool2d: kernel [{}, {}] larger than padded input [{}, {}]",
                kh,
                kw,
                h + 2 * ph,
                w + 2 * pw
            )));
        }

        let h_out = (h + 2 * ph - kh) / sh + 1;
        let w_out = (w + 2 * pw - kw) / sw + 1;
        let area = (kh * kw) as f32;
        let mut out = vec![0.0f32; n * c * h_out * w_out];

        for (plane, dst) in out.chunks_mut(h_out * w_out).enumerate() {
            let src = &self.data[plane * h * w..(plane + 1) * h * w];
            for oh in 0..h_out {
                for ow in 0..w_out {
                    let mut sum = 0.0f32;
                    for ki in 0..kh {
                        let ih = (oh * sh + ki) as isize - ph as isize;
                        if ih < 0 || ih >= h as isize {
                            continue;
                        }
                        for kj in 0..kw {
                            let iw = (ow * sw + kj) as isize - pw as isize;
                            if iw >= 0 && iw < w as isize {
                                sum += src[ih as usize * w + iw as usize];
                            }
                        }
                    }
                    dst[oh * w_out + ow] = sum / area;
                }
            }
        }

        Ok(Self::from_parts(
            out,
            Shape::new(vec![n, c, h_out, w_out]),
            self.device,
        ))
    }
}

#[inline]
fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// `(outer, size, inner)` element counts around `dim`.
fn split_at_dim(dims: &[usize], dim: usize) -> (usize, usize, usize) {
    let outer = dims[..dim].iter().product();
    let inner = dims[dim + 1..].iter().product();
    (outer, dims[dim], inner)
}

/// Walk `out_dims` in row-major order reading `src` through `strides`.
fn gather_strided(src: &[f32], out_dims: &[usize], strides: &[usize]) -> Vec<f32> {
    let n: usize = out_dims.iter().product();
    let mut out = Vec::with_capacity(n);
    let mut index = vec![0usize; out_dims.len()];
    let mut offset = 0usize;
    for _ in 0..n {
        out.push(src[offset]);
        for d in (0..out_dims.len()).rev() {
            index[d] += 1;
            offset += strides[d];
            if index[d] < out_dims[d] {
                break;
            }
            offset -= strides[d] * out_dims[d];
            index[d] = 0;
        }
    }
    out
}

// im2col — convolution as matrix multiplication
//
//   columns = im2col(input)   [C_in * kH * kW, H_out * W_out]
//   output  = weight × columns [C_out, H_out * W_out]

struct ConvGeometry {
    c_in: usize,
    h: usize,
    w: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    h_out: usize,
    w_out: usize,
}

/// Unroll the sliding-window patches of one `[C_in, H, W]` sample.
fn im2col(input: &[f32], g: &ConvGeometry, columns: &mut [f32]) {
    let col_cols = g.h_out * g.w_out;
    for ci in 0..g.c_in {
        for ki in 0..g.kh {
            for kj in 0..g.kw {
                let row = (ci * g.kh + ki) * g.kw + kj;
                let dst = &mut columns[row * col_cols..(row + 1) * col_cols];
                for oh in 0..g.h_out {
                    let ih = (oh * g.sh + ki) as isize - g.ph as isize;
                    for ow in 0..g.w_out {
                        let iw = (ow * g.sw + kj) as isize - g.pw as isize;
                        dst[oh * g.w_out + ow] =
                            if ih >= 0 && ih < g.h as isize && iw >= 0 && iw < g.w as isize {
                                input[(ci * g.h + ih as usize) * g.w + iw as usize]
                            } else {
                                0.0
                            };
                    }
                }
            }
        }
    }
}

/// C += A × B with A: [m, k], B: [k, n], C: [m, n], all row-major.
#[inline]
fn gemm(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_val = a[i * k + p];
            if a_val == 0.0 {
                continue;
            }
            let b_row = &b[p * n..(p + 1) * n];
            for (cv, &bv) in c_row.iter_mut().zip(b_row) {
                *cv += a_val * bv;
            }
        }
    }
}
