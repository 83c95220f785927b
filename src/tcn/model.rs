//! Full TCNN Model Implementation

use ndarray::{concatenate, s, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::block::{BlockSpec, TemporalBlock};
use super::head::DenseHead;
use crate::config::{TcnnConfig, WeightInit};
use crate::error::{Result, TcnnError};

/// One batch of model inputs
///
/// Side inputs with zero elements are skipped during concatenation.
#[derive(Debug, Clone)]
pub struct ModelInputs {
    /// Dynamic inputs [batch, seq_len, n_dynamic]
    pub x_d: Array3<f64>,
    /// Static inputs and catchment attributes [batch, n_static]
    pub x_s: Array2<f64>,
    /// One-hot basin encoding [batch, n_basins]
    pub x_one_hot: Array2<f64>,
}

impl ModelInputs {
    /// Dynamic inputs only
    pub fn new(x_d: Array3<f64>) -> Self {
        let batch = x_d.len_of(Axis(0));
        Self {
            x_d,
            x_s: Array2::zeros((batch, 0)),
            x_one_hot: Array2::zeros((batch, 0)),
        }
    }

    pub fn with_static(mut self, x_s: Array2<f64>) -> Self {
        self.x_s = x_s;
        self
    }

    pub fn with_one_hot(mut self, x_one_hot: Array2<f64>) -> Self {
        self.x_one_hot = x_one_hot;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.x_d.len_of(Axis(0))
    }

    pub fn seq_len(&self) -> usize {
        self.x_d.len_of(Axis(1))
    }
}

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Predictions [batch, 1, output_size]
    pub y_hat: Array3<f64>,
    /// Last `output_window` steps of the block stack [batch, num_channels, output_window]
    pub tcnn_out: Array3<f64>,
    /// Concatenated inputs in convolution layout [batch, input_size, seq_len]
    pub x_d: Array3<f64>,
}

/// Temporal Convolutional Neural Network
#[derive(Debug, Clone)]
pub struct Tcnn {
    /// Configuration
    pub config: TcnnConfig,
    /// Stack of temporal blocks
    pub blocks: Vec<TemporalBlock>,
    /// Dense regression head
    pub head: DenseHead,
}

impl Tcnn {
    /// Build a model, seeding the initialisation from `config.seed` when set
    pub fn new(config: TcnnConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    /// Build a model drawing initial weights from `rng`
    pub fn with_rng<R: Rng + ?Sized>(config: TcnnConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        if !config.camels_attributes.is_empty() {
            info!(
                count = config.camels_attributes.len(),
                "using catchment attributes as inputs"
            );
        }

        let input_size = config.input_size();
        let mut blocks = Vec::with_capacity(config.num_levels);

        for level in 0..config.num_levels {
            let in_channels = if level == 0 { input_size } else { config.num_channels };
            let spec = BlockSpec::causal(
                in_channels,
                config.num_channels,
                config.kernel_size,
                config.dilation_at(level),
                config.block_dropout,
            );
            let mut block = TemporalBlock::new(spec, rng);
            if config.weight_init == WeightInit::TemporalBlock {
                block.init_weights(rng)?;
            }
            debug!(
                level,
                in_channels,
                dilation = spec.dilation,
                padding = spec.padding,
                "built temporal block"
            );
            blocks.push(block);
        }

        let head = DenseHead::new(
            config.head_input_size(),
            config.hidden_size,
            config.output_size,
            config.output_dropout,
            rng,
        );

        Ok(Self {
            config,
            blocks,
            head,
        })
    }

    /// Concatenate dynamic and side inputs into `[batch, features, seq_len]`
    ///
    /// Side inputs are repeated along the time axis and appended after the
    /// dynamic features in the order static, one-hot.
    pub fn assemble_inputs(&self, inputs: &ModelInputs) -> Result<Array3<f64>> {
        let (batch, seq_len, _) = inputs.x_d.dim();

        let mut parts = vec![inputs.x_d.view().permuted_axes([0, 2, 1]).to_owned()];
        for (name, side) in [("static inputs", &inputs.x_s), ("one-hot encoding", &inputs.x_one_hot)] {
            if side.is_empty() {
                continue;
            }
            if side.nrows() != batch {
                return Err(TcnnError::ShapeMismatch {
                    context: "side input batch size",
                    expected: batch.to_string(),
                    got: format!("{} ({name})", side.nrows()),
                });
            }
            let repeated = side
                .view()
                .insert_axis(Axis(2))
                .broadcast((batch, side.ncols(), seq_len))
                .ok_or_else(|| TcnnError::shape("side input broadcast", "[batch, n]", format!("{:?}", side.dim())))?
                .to_owned();
            parts.push(repeated);
        }

        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let x = concatenate(Axis(1), &views)?;

        let features = x.len_of(Axis(1));
        if features != self.config.input_size() {
            return Err(TcnnError::shape("model input features", self.config.input_size(), features));
        }
        Ok(x)
    }

    /// Forward pass in evaluation mode (dropout disabled)
    pub fn forward(&self, inputs: &ModelInputs) -> Result<ModelOutput> {
        self.run(inputs, None)
    }

    /// Forward pass in training mode, drawing dropout masks from `rng`
    pub fn forward_train(&self, inputs: &ModelInputs, rng: &mut StdRng) -> Result<ModelOutput> {
        self.run(inputs, Some(rng))
    }

    fn run(&self, inputs: &ModelInputs, mut rng: Option<&mut StdRng>) -> Result<ModelOutput> {
        let x_d = self.assemble_inputs(inputs)?;
        let (batch, _, seq_len) = x_d.dim();
        let window = self.config.output_window;
        if seq_len < window {
            return Err(TcnnError::SequenceTooShort { seq_len, window });
        }

        let mut hidden = x_d.clone();
        for block in &self.blocks {
            hidden = block.forward(&hidden, rng.as_deref_mut())?;
        }

        let tcnn_out = hidden.slice(s![.., .., seq_len - window..]).to_owned();
        let flat = tcnn_out
            .as_standard_layout()
            .into_owned()
            .into_shape((batch, self.config.head_input_size()))?;

        let y_hat = self.head.forward(&flat, rng)?.insert_axis(Axis(1));

        Ok(ModelOutput {
            y_hat,
            tcnn_out,
            x_d,
        })
    }

    /// Predictions only, shape [batch, output_size]
    pub fn predict(&self, inputs: &ModelInputs) -> Result<Array2<f64>> {
        Ok(self.forward(inputs)?.y_hat.index_axis_move(Axis(1), 0))
    }

    /// Get receptive field of the model
    pub fn receptive_field(&self) -> usize {
        self.config.receptive_field()
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        let block_params: usize = self.blocks.iter().map(|b| b.num_parameters()).sum();
        block_params + self.head.num_parameters()
    }

    /// Get model summary as string
    pub fn summary(&self) -> String {
        let dilations: Vec<usize> = self.blocks.iter().map(|b| b.spec.dilation).collect();
        let mut s = String::new();
        s.push_str("TCNN Model Summary\n");
        s.push_str("==================\n");
        s.push_str(&format!("Input size: {}\n", self.config.input_size()));
        s.push_str(&format!("Num levels: {}\n", self.blocks.len()));
        s.push_str(&format!("Channels: {}\n", self.config.num_channels));
        s.push_str(&format!("Kernel size: {}\n", self.config.kernel_size));
        s.push_str(&format!("Dilations: {:?}\n", dilations));
        s.push_str(&format!("Block dropout: {}\n", self.config.block_dropout));
        s.push_str(&format!("Output window: {}\n", self.config.output_window));
        s.push_str(&format!(
            "Dense head: {} -> {} -> {}\n",
            self.config.head_input_size(),
            self.config.hidden_size,
            self.config.output_size
        ));
        s.push_str(&format!("Output dropout: {}\n", self.config.output_dropout));
        s.push_str(&format!("Receptive field: {}\n", self.receptive_field()));
        s.push_str(&format!("Total parameters: {}\n", self.num_parameters()));
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DilationSchedule;
    use approx::assert_abs_diff_eq;

    fn small_config() -> TcnnConfig {
        TcnnConfig {
            dynamic_inputs: vec!["prcp".into(), "tmax".into(), "tmin".into()],
            kernel_size: 3,
            num_levels: 2,
            num_channels: 8,
            output_dropout: 0.4,
            output_window: 5,
            hidden_size: 16,
            seq_length: 40,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn ramp(batch: usize, seq_len: usize, features: usize) -> Array3<f64> {
        Array3::from_shape_fn((batch, seq_len, features), |(b, t, f)| {
            ((b + 1) as f64 * 0.1 + t as f64 * 0.05 + f as f64).sin()
        })
    }

    #[test]
    fn test_model_creation() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        assert_eq!(tcnn.blocks.len(), 2);
        assert!(tcnn.blocks[0].downsample.is_some());
        assert!(tcnn.blocks[1].downsample.is_none());
        assert_eq!(tcnn.blocks[0].spec.dilation, 6);
        assert_eq!(tcnn.blocks[1].spec.dilation, 12);
        assert_eq!(tcnn.head.dense1.in_features(), 8 * 5);
    }

    #[test]
    fn test_forward_shapes() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        let output = tcnn.forward(&ModelInputs::new(ramp(4, 40, 3))).unwrap();

        assert_eq!(output.y_hat.dim(), (4, 1, 1));
        assert_eq!(output.tcnn_out.dim(), (4, 8, 5));
        assert_eq!(output.x_d.dim(), (4, 3, 40));
    }

    #[test]
    fn test_side_inputs_are_repeated() {
        let config = TcnnConfig {
            camels_attributes: vec!["area".into(), "elev".into()],
            use_basin_id_encoding: true,
            number_of_basins: 3,
            ..small_config()
        };
        let tcnn = Tcnn::new(config).unwrap();

        let x_d = ramp(2, 30, 3);
        let x_s = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let one_hot = ndarray::arr2(&[[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let inputs = ModelInputs::new(x_d.clone())
            .with_static(x_s)
            .with_one_hot(one_hot);

        let assembled = tcnn.assemble_inputs(&inputs).unwrap();
        assert_eq!(assembled.dim(), (2, 8, 30));
        for t in [0, 17, 29] {
            assert_eq!(assembled[[0, 0, t]], x_d[[0, t, 0]]);
            assert_eq!(assembled[[1, 2, t]], x_d[[1, t, 2]]);
            assert_eq!(assembled[[0, 3, t]], 1.0);
            assert_eq!(assembled[[1, 4, t]], 4.0);
            assert_eq!(assembled[[0, 6, t]], 1.0);
            assert_eq!(assembled[[1, 7, t]], 1.0);
            assert_eq!(assembled[[1, 5, t]], 0.0);
        }

        let output = tcnn.forward(&inputs).unwrap();
        assert_eq!(output.y_hat.dim(), (2, 1, 1));
    }

    #[test]
    fn test_feature_count_mismatch() {
        let config = TcnnConfig {
            camels_attributes: vec!["area".into()],
            ..small_config()
        };
        let tcnn = Tcnn::new(config).unwrap();

        // Attributes configured but not supplied
        let result = tcnn.forward(&ModelInputs::new(ramp(2, 30, 3)));
        assert!(matches!(result, Err(TcnnError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_side_batch_mismatch() {
        let config = TcnnConfig {
            camels_attributes: vec!["area".into()],
            ..small_config()
        };
        let tcnn = Tcnn::new(config).unwrap();
        let inputs = ModelInputs::new(ramp(2, 30, 3)).with_static(Array2::ones((3, 1)));
        assert!(tcnn.forward(&inputs).is_err());
    }

    #[test]
    fn test_sequence_shorter_than_window() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        let result = tcnn.forward(&ModelInputs::new(ramp(1, 4, 3)));
        assert!(matches!(
            result,
            Err(TcnnError::SequenceTooShort { seq_len: 4, window: 5 })
        ));
    }

    #[test]
    fn test_eval_is_deterministic_and_seeded() {
        let a = Tcnn::new(small_config()).unwrap();
        let b = Tcnn::new(small_config()).unwrap();
        let inputs = ModelInputs::new(ramp(3, 40, 3));

        let ya = a.predict(&inputs).unwrap();
        assert_eq!(ya, a.predict(&inputs).unwrap());
        assert_eq!(ya, b.predict(&inputs).unwrap());
        assert_eq!(ya.dim(), (3, 1));
    }

    #[test]
    fn test_training_mode_uses_dropout() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        let inputs = ModelInputs::new(ramp(3, 40, 3));

        let eval = tcnn.forward(&inputs).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let train = tcnn.forward_train(&inputs, &mut rng).unwrap();
        assert_eq!(train.y_hat.dim(), eval.y_hat.dim());
        assert_ne!(train.y_hat, eval.y_hat);
    }

    #[test]
    fn test_window_is_causal() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        let base = ramp(1, 40, 3);
        let mut perturbed = base.clone();
        // step 37 is the third step of the 5-step output window
        perturbed[[0, 37, 1]] += 3.0;

        let a = tcnn.forward(&ModelInputs::new(base)).unwrap().tcnn_out;
        let b = tcnn.forward(&ModelInputs::new(perturbed)).unwrap().tcnn_out;
        for c in 0..8 {
            for t in 0..2 {
                assert_abs_diff_eq!(a[[0, c, t]], b[[0, c, t]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_temporal_block_init_and_exponential_dilation() {
        let config = TcnnConfig {
            weight_init: WeightInit::TemporalBlock,
            dilation: DilationSchedule::Exponential { base: 2 },
            num_levels: 3,
            ..small_config()
        };
        let tcnn = Tcnn::new(config).unwrap();
        let dilations: Vec<usize> = tcnn.blocks.iter().map(|b| b.spec.dilation).collect();
        assert_eq!(dilations, vec![1, 2, 4]);
        // 1 + 2*2*(1+2+4)
        assert_eq!(tcnn.receptive_field(), 29);

        let output = tcnn.forward(&ModelInputs::new(ramp(2, 40, 3))).unwrap();
        assert!(output.y_hat.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TcnnConfig {
            num_levels: 0,
            ..small_config()
        };
        assert!(matches!(Tcnn::new(config), Err(TcnnError::InvalidConfig(_))));
    }

    #[test]
    fn test_model_summary() {
        let tcnn = Tcnn::new(small_config()).unwrap();
        let summary = tcnn.summary();
        assert!(summary.contains("TCNN Model Summary"));
        assert!(summary.contains("Dilations: [6, 12]"));
        assert!(summary.contains("Dense head: 40 -> 16 -> 1"));
    }
}
