//! Layer primitives: convolution, causal trim, weight normalization, dense
//! projection and dropout
//!
//! All sequence tensors are laid out as `[batch, channels, time]`.

use ndarray::{s, Array, Array1, Array2, Array3, ArrayView3, Axis, Dimension};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Uniform;

use crate::error::{Result, TcnnError};

/// Rectified linear unit
pub fn relu<D: Dimension>(x: Array<f64, D>) -> Array<f64, D> {
    x.mapv_into(|v| v.max(0.0))
}

/// Fan-in scaled uniform distribution used as the default init
fn fan_in_uniform(fan_in: usize) -> Uniform<f64> {
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    Uniform::new_inclusive(-bound, bound)
}

/// 1D convolution over `[batch, channels, time]`
///
/// Zero padding is applied on both ends of the time axis, as in the usual
/// framework convolution. Combine with [`Chomp1d`] to make it causal.
#[derive(Debug, Clone)]
pub struct Conv1d {
    /// Convolution weights [out_channels, in_channels, kernel_size]
    pub weight: Array3<f64>,
    /// Bias terms [out_channels]
    pub bias: Array1<f64>,
    /// Input channels
    pub in_channels: usize,
    /// Output channels
    pub out_channels: usize,
    /// Kernel size
    pub kernel_size: usize,
    /// Stride
    pub stride: usize,
    /// Zero padding added to each end of the sequence
    pub padding: usize,
    /// Dilation factor
    pub dilation: usize,
}

impl Conv1d {
    /// Create a convolution with stride 1, no padding and no dilation
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        rng: &mut R,
    ) -> Self {
        let dist = fan_in_uniform(in_channels * kernel_size);
        let weight = Array3::random_using((out_channels, in_channels, kernel_size), dist, rng);
        let bias = Array1::random_using(out_channels, dist, rng);

        Self {
            weight,
            bias,
            in_channels,
            out_channels,
            kernel_size,
            stride: 1,
            padding: 0,
            dilation: 1,
        }
    }

    /// Builder method to set stride
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Builder method to set padding
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Builder method to set dilation
    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation.max(1);
        self
    }

    /// Number of input steps covered by one kernel application
    pub fn span(&self) -> usize {
        self.dilation * self.kernel_size.saturating_sub(1) + 1
    }

    /// Output length for an input of `input_len` steps, `None` if empty
    pub fn output_length(&self, input_len: usize) -> Option<usize> {
        let padded = input_len + 2 * self.padding;
        if padded < self.span() {
            return None;
        }
        Some((padded - self.span()) / self.stride + 1)
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, in_channels, seq_len]
    ///
    /// # Returns
    /// Output tensor of shape [batch, out_channels, output_length(seq_len)]
    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        self.convolve(input, self.weight.view())
    }

    /// Convolve with an externally supplied weight of the same shape
    pub(crate) fn convolve(&self, input: &Array3<f64>, weight: ArrayView3<f64>) -> Result<Array3<f64>> {
        let (batch, channels, seq_len) = input.dim();
        if self.kernel_size == 0 {
            return Err(TcnnError::shape("conv1d kernel size", "at least 1", 0));
        }
        if channels != self.in_channels {
            return Err(TcnnError::shape("conv1d input channels", self.in_channels, channels));
        }
        let out_len = self.output_length(seq_len).ok_or_else(|| {
            TcnnError::shape(
                "conv1d sequence length",
                format!("at least {}", self.span().saturating_sub(2 * self.padding)),
                seq_len,
            )
        })?;

        let pad = self.padding;
        let mut padded = Array3::zeros((batch, channels, seq_len + 2 * pad));
        padded.slice_mut(s![.., .., pad..pad + seq_len]).assign(input);

        let step = self.stride as isize;
        let bias = self.bias.view().insert_axis(Axis(1));
        let mut output = Array3::zeros((batch, self.out_channels, out_len));

        for (x, mut out) in padded.outer_iter().zip(output.outer_iter_mut()) {
            for k in 0..self.kernel_size {
                let start = k * self.dilation;
                let end = start + (out_len - 1) * self.stride + 1;
                let taps = x.slice(s![.., start..end;step]);
                let w = weight.index_axis(Axis(2), k);
                out += &w.dot(&taps);
            }
            out += &bias;
        }

        Ok(output)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Trims the trailing `chomp_size` steps left over by symmetric padding
#[derive(Debug, Clone, Copy)]
pub struct Chomp1d {
    pub chomp_size: usize,
}

impl Chomp1d {
    pub fn new(chomp_size: usize) -> Self {
        Self { chomp_size }
    }

    pub fn forward(&self, input: Array3<f64>) -> Array3<f64> {
        if self.chomp_size == 0 {
            return input;
        }
        let keep = input.len_of(Axis(2)).saturating_sub(self.chomp_size);
        input.slice_move(s![.., .., ..keep])
    }
}

/// Weight-normalized convolution
///
/// The wrapped convolution's weight is the direction `v`; the effective
/// weight of output channel `o` is `g[o] * v[o] / ||v[o]||`.
#[derive(Debug, Clone)]
pub struct WeightNormConv1d {
    /// Underlying convolution, its weight holds the direction
    pub conv: Conv1d,
    /// Magnitude per output channel
    pub g: Array1<f64>,
}

impl WeightNormConv1d {
    /// Wrap a convolution; `g` starts at `||v||` so the effective weight is unchanged
    pub fn new(conv: Conv1d) -> Self {
        let g = channel_norms(&conv.weight);
        Self { conv, g }
    }

    /// Replace the direction and reset the magnitude to its norm
    pub fn reset_direction(&mut self, direction: Array3<f64>) -> Result<()> {
        if direction.dim() != self.conv.weight.dim() {
            return Err(TcnnError::shape(
                "weight norm direction",
                format!("{:?}", self.conv.weight.dim()),
                format!("{:?}", direction.dim()),
            ));
        }
        self.g = channel_norms(&direction);
        self.conv.weight = direction;
        Ok(())
    }

    /// Weight actually used by the convolution
    pub fn effective_weight(&self) -> Array3<f64> {
        let norms = channel_norms(&self.conv.weight);
        let mut weight = self.conv.weight.clone();
        for ((mut row, &norm), &g) in weight.outer_iter_mut().zip(norms.iter()).zip(self.g.iter()) {
            // a zero direction has no orientation to scale
            let scale = if norm > 0.0 { g / norm } else { 0.0 };
            row.mapv_inplace(|v| v * scale);
        }
        weight
    }

    pub fn forward(&self, input: &Array3<f64>) -> Result<Array3<f64>> {
        let weight = self.effective_weight();
        self.conv.convolve(input, weight.view())
    }

    pub fn num_parameters(&self) -> usize {
        self.conv.num_parameters() + self.g.len()
    }
}

/// L2 norm of every output channel's filter
fn channel_norms(weight: &Array3<f64>) -> Array1<f64> {
    weight
        .outer_iter()
        .map(|filter| filter.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect()
}

/// Fully connected layer over `[batch, features]`
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weights [out_features, in_features]
    pub weight: Array2<f64>,
    /// Bias [out_features]
    pub bias: Array1<f64>,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let dist = fan_in_uniform(in_features);
        Self {
            weight: Array2::random_using((out_features, in_features), dist, rng),
            bias: Array1::random_using(out_features, dist, rng),
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, input: &Array2<f64>) -> Result<Array2<f64>> {
        if input.ncols() != self.in_features() {
            return Err(TcnnError::shape("linear input features", self.in_features(), input.ncols()));
        }
        Ok(input.dot(&self.weight.t()) + &self.bias)
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Inverted dropout
///
/// Passing `None` as the generator runs the layer in evaluation mode.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    pub p: f64,
}

impl Dropout {
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    pub fn forward<D: Dimension>(&self, input: Array<f64, D>, rng: Option<&mut StdRng>) -> Array<f64, D> {
        match rng {
            Some(rng) if self.p > 0.0 => {
                let keep = 1.0 - self.p;
                let scale = if keep > 0.0 { 1.0 / keep } else { 0.0 };
                input.mapv_into(|v| if rng.gen::<f64>() < keep { v * scale } else { 0.0 })
            }
            _ => input,
        }
    }
}
