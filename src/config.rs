//! Model configuration
//!
//! The configuration is flat and uses the same key names as the hydrology
//! run configs the model is trained from, so an existing run file can be
//! loaded directly. The legacy spelling `kernal_size` is accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TcnnError};

/// How the dilation grows with block depth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DilationSchedule {
    /// `step * (level + 1)`: 6, 12, 18, ... for the default step
    Linear { step: usize },
    /// `base ^ level`: 1, 2, 4, ... for base 2
    Exponential { base: usize },
}

impl Default for DilationSchedule {
    fn default() -> Self {
        DilationSchedule::Linear { step: 6 }
    }
}

impl DilationSchedule {
    /// Dilation of the block at `level` (0-based)
    pub fn dilation(&self, level: usize) -> usize {
        match *self {
            DilationSchedule::Linear { step } => step * (level + 1),
            DilationSchedule::Exponential { base } => base.pow(level as u32),
        }
    }
}

/// Weight initialisation scheme for the temporal blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInit {
    /// Fan-in scaled uniform init for every layer
    #[default]
    Framework,
    /// Conv directions from U(-0.1, 0.1), 1x1 projections from N(0, 0.01)
    TemporalBlock,
}

/// TCNN model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcnnConfig {
    /// Names of the time-varying forcing variables
    pub dynamic_inputs: Vec<String>,
    /// Names of static inputs read from the attribute table alongside `camels_attributes`
    #[serde(default)]
    pub static_inputs: Vec<String>,
    /// Names of catchment attributes appended to every time step
    #[serde(default)]
    pub camels_attributes: Vec<String>,
    /// Append a one-hot basin encoding to every time step
    #[serde(default)]
    pub use_basin_id_encoding: bool,
    /// Width of the one-hot basin encoding
    #[serde(default)]
    pub number_of_basins: usize,
    /// Convolution kernel size
    #[serde(alias = "kernal_size")]
    pub kernel_size: usize,
    /// Number of temporal blocks
    pub num_levels: usize,
    /// Channels produced by every temporal block
    pub num_channels: usize,
    /// Dropout inside the temporal blocks
    #[serde(default = "default_block_dropout")]
    pub block_dropout: f64,
    /// Dropout between the two dense layers
    pub output_dropout: f64,
    /// Number of trailing time steps fed to the dense head
    #[serde(default = "default_output_window")]
    pub output_window: usize,
    /// Width of the hidden dense layer
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    /// Number of regression targets
    #[serde(default = "default_output_size")]
    pub output_size: usize,
    /// Initialisation scheme
    #[serde(default)]
    pub weight_init: WeightInit,
    /// Length of the input sequences
    #[serde(default = "default_seq_length")]
    pub seq_length: usize,
    /// Seed for weight initialisation (entropy when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Dilation schedule across levels
    #[serde(default)]
    pub dilation: DilationSchedule,
}

fn default_block_dropout() -> f64 {
    0.4
}

fn default_output_window() -> usize {
    20
}

fn default_hidden_size() -> usize {
    100
}

fn default_output_size() -> usize {
    1
}

fn default_seq_length() -> usize {
    365
}

impl Default for TcnnConfig {
    fn default() -> Self {
        Self {
            dynamic_inputs: vec![
                "prcp(mm/day)".to_string(),
                "srad(W/m2)".to_string(),
                "tmax(C)".to_string(),
                "tmin(C)".to_string(),
                "vp(Pa)".to_string(),
            ],
            static_inputs: Vec::new(),
            camels_attributes: Vec::new(),
            use_basin_id_encoding: false,
            number_of_basins: 0,
            kernel_size: 3,
            num_levels: 2,
            num_channels: 20,
            block_dropout: default_block_dropout(),
            output_dropout: 0.4,
            output_window: default_output_window(),
            hidden_size: default_hidden_size(),
            output_size: default_output_size(),
            weight_init: WeightInit::default(),
            seq_length: default_seq_length(),
            seed: None,
            dilation: DilationSchedule::default(),
        }
    }
}

impl TcnnConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.as_ref().display(), "loaded model config");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TcnnConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Number of features seen by the first temporal block
    pub fn input_size(&self) -> usize {
        let mut size =
            self.dynamic_inputs.len() + self.static_inputs.len() + self.camels_attributes.len();
        if self.use_basin_id_encoding {
            size += self.number_of_basins;
        }
        size
    }

    /// Width of the side input vector (static inputs plus attributes)
    pub fn static_size(&self) -> usize {
        self.static_inputs.len() + self.camels_attributes.len()
    }

    /// Width of the one-hot basin encoding, zero when disabled
    pub fn one_hot_size(&self) -> usize {
        if self.use_basin_id_encoding {
            self.number_of_basins
        } else {
            0
        }
    }

    /// Dilation of the block at `level`
    pub fn dilation_at(&self, level: usize) -> usize {
        self.dilation.dilation(level)
    }

    /// Causal padding of the block at `level`
    pub fn padding_at(&self, level: usize) -> usize {
        (self.kernel_size - 1) * self.dilation_at(level)
    }

    /// Number of past time steps that can influence one output step
    pub fn receptive_field(&self) -> usize {
        1 + (0..self.num_levels)
            .map(|level| 2 * self.padding_at(level))
            .sum::<usize>()
    }

    /// Flattened width entering the dense head
    pub fn head_input_size(&self) -> usize {
        self.num_channels * self.output_window
    }

    /// Check the configuration for values the model cannot be built from
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(TcnnError::InvalidConfig(msg.into()))
        }

        if self.dynamic_inputs.is_empty() {
            return invalid("dynamic_inputs must not be empty");
        }
        if self.use_basin_id_encoding && self.number_of_basins == 0 {
            return invalid("use_basin_id_encoding requires number_of_basins > 0");
        }
        if self.kernel_size == 0 {
            return invalid("kernel_size must be positive");
        }
        if self.num_levels == 0 {
            return invalid("num_levels must be positive");
        }
        if self.num_channels == 0 {
            return invalid("num_channels must be positive");
        }
        if self.hidden_size == 0 || self.output_size == 0 {
            return invalid("hidden_size and output_size must be positive");
        }
        for (name, p) in [
            ("block_dropout", self.block_dropout),
            ("output_dropout", self.output_dropout),
        ] {
            if !(0.0..1.0).contains(&p) {
                return invalid(format!("{name} must be in [0, 1), got {p}"));
            }
        }
        if self.output_window == 0 {
            return invalid("output_window must be positive");
        }
        if self.seq_length < self.output_window {
            return invalid(format!(
                "seq_length ({}) must be at least output_window ({})",
                self.seq_length, self.output_window
            ));
        }
        match self.dilation {
            DilationSchedule::Linear { step: 0 } => {
                return invalid("linear dilation step must be positive")
            }
            DilationSchedule::Exponential { base } if base < 2 => {
                return invalid("exponential dilation base must be at least 2")
            }
            _ => {}
        }
        if self.checked_receptive_field().is_none() {
            return invalid(format!(
                "dilation schedule {:?} over {} levels overflows the receptive field",
                self.dilation, self.num_levels
            ));
        }
        Ok(())
    }

    /// Receptive field with every dilation, padding and sum checked for overflow
    fn checked_receptive_field(&self) -> Option<usize> {
        let taps = self.kernel_size.checked_sub(1)?;
        (0..self.num_levels).try_fold(1usize, |total, level| {
            let dilation = match self.dilation {
                DilationSchedule::Linear { step } => step.checked_mul(level.checked_add(1)?)?,
                DilationSchedule::Exponential { base } => {
                    base.checked_pow(u32::try_from(level).ok()?)?
                }
            };
            let padding = taps.checked_mul(dilation)?;
            total.checked_add(padding.checked_mul(2)?)
        })
    }
}
