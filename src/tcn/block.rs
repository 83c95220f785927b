//! Temporal Block Implementation

use ndarray::Array3;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Normal, Uniform};

use super::layer::{relu, Chomp1d, Conv1d, Dropout, WeightNormConv1d};
use crate::error::{Result, TcnnError};

/// Shape parameters of one temporal block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub dilation: usize,
    /// Causal padding, normally `(kernel_size - 1) * dilation`
    pub padding: usize,
    pub dropout: f64,
}

impl BlockSpec {
    /// Causal block with stride 1 and the padding that preserves length
    pub fn causal(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dilation: usize,
        dropout: f64,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            stride: 1,
            dilation,
            padding: kernel_size.saturating_sub(1) * dilation,
            dropout,
        }
    }
}

/// Residual block of the TCNN
///
/// Structure:
/// ```text
/// Input
///   |
///   +---> WN-Conv1d -> Chomp -> ReLU -> Dropout -> WN-Conv1d -> Chomp -> ReLU -> Dropout
///   |                                                                                 |
///   +------------------------ (1x1 conv when widths differ) ------------------------ (+)
///                                                                                     |
///                                                                                    ReLU
/// ```
#[derive(Debug, Clone)]
pub struct TemporalBlock {
    pub conv1: WeightNormConv1d,
    pub chomp1: Chomp1d,
    pub conv2: WeightNormConv1d,
    pub chomp2: Chomp1d,
    pub dropout: Dropout,
    /// 1x1 projection of the skip path
    pub downsample: Option<Conv1d>,
    pub spec: BlockSpec,
}

impl TemporalBlock {
    pub fn new<R: Rng + ?Sized>(spec: BlockSpec, rng: &mut R) -> Self {
        let conv = |in_channels: usize, rng: &mut R| {
            Conv1d::new(in_channels, spec.out_channels, spec.kernel_size, rng)
                .with_stride(spec.stride)
                .with_padding(spec.padding)
                .with_dilation(spec.dilation)
        };
        let conv1 = WeightNormConv1d::new(conv(spec.in_channels, &mut *rng));
        let conv2 = WeightNormConv1d::new(conv(spec.out_channels, &mut *rng));

        let downsample = (spec.in_channels != spec.out_channels)
            .then(|| Conv1d::new(spec.in_channels, spec.out_channels, 1, rng));

        Self {
            conv1,
            chomp1: Chomp1d::new(spec.padding),
            conv2,
            chomp2: Chomp1d::new(spec.padding),
            dropout: Dropout::new(spec.dropout),
            downsample,
            spec,
        }
    }

    /// Re-draw conv directions from U(-0.1, 0.1) and the projection from N(0, 0.01)
    pub fn init_weights<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let uniform = Uniform::new_inclusive(-0.1, 0.1);
        for conv in [&mut self.conv1, &mut self.conv2] {
            let direction = Array3::random_using(conv.conv.weight.dim(), uniform, rng);
            conv.reset_direction(direction)?;
        }
        if let Some(ref mut downsample) = self.downsample {
            let normal =
                Normal::new(0.0, 0.01).map_err(|e| TcnnError::InvalidConfig(e.to_string()))?;
            downsample.weight = Array3::random_using(downsample.weight.dim(), normal, rng);
        }
        Ok(())
    }

    /// Forward pass through the block
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape [batch, in_channels, seq_len]
    /// * `rng` - Dropout generator, `None` for evaluation
    ///
    /// # Returns
    /// Output tensor of shape [batch, out_channels, seq_len]
    pub fn forward(&self, input: &Array3<f64>, mut rng: Option<&mut StdRng>) -> Result<Array3<f64>> {
        let out = self.chomp1.forward(self.conv1.forward(input)?);
        let out = self.dropout.forward(relu(out), rng.as_deref_mut());

        let out = self.chomp2.forward(self.conv2.forward(&out)?);
        let out = self.dropout.forward(relu(out), rng.as_deref_mut());

        let residual = match &self.downsample {
            Some(conv) => conv.forward(input)?,
            None => input.clone(),
        };

        Ok(relu(out + &residual))
    }

    /// Receptive field of this block
    pub fn receptive_field(&self) -> usize {
        // Two convolutions with the same dilation
        2 * self.spec.kernel_size.saturating_sub(1) * self.spec.dilation + 1
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        let mut params = self.conv1.num_parameters() + self.conv2.num_parameters();
        if let Some(ref conv) = self.downsample {
            params += conv.num_parameters();
        }
        params
    }
}
