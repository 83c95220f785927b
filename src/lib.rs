//! # Hydro TCNN
//!
//! A Temporal Convolutional Neural Network for hydrological sequence
//! regression, e.g. predicting daily discharge from meteorological forcings.
//!
//! ## Overview
//!
//! The model stacks temporal blocks of weight-normalized causal dilated
//! convolutions with residual connections, appends static catchment
//! attributes and an optional basin encoding to every time step, keeps the
//! last steps of the block output and maps them to a prediction through a
//! two-layer dense head.
//!
//! ## Modules
//!
//! - `config` - Model configuration loaded from TOML run files
//! - `tcn` - Layers, temporal blocks and the full model
//! - `data` - Basin time series, windowing, scaling and side inputs
//! - `utils` - Hydrological performance metrics
//! - `error` - Library error type
//!
//! ## Example
//!
//! ```rust,no_run
//! use hydro_tcnn::prelude::*;
//! use ndarray::Array3;
//!
//! fn main() -> hydro_tcnn::Result<()> {
//!     let config = TcnnConfig::load("tcnn.toml")?;
//!     let tcnn = Tcnn::new(config)?;
//!
//!     // [batch, seq_len, dynamic inputs]
//!     let x_d = Array3::zeros((8, 365, 5));
//!     let output = tcnn.forward(&ModelInputs::new(x_d))?;
//!
//!     println!("{:?}", output.y_hat.dim());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod tcn;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DilationSchedule, TcnnConfig, WeightInit};
    pub use crate::data::{
        sliding_windows, AttributeTable, BasinEncoder, FeatureScaler, NormalizationMethod,
        TimeSeries, Windows,
    };
    pub use crate::error::{Result, TcnnError};
    pub use crate::tcn::{ModelInputs, ModelOutput, TemporalBlock, Tcnn};
    pub use crate::utils::{kge, mae, nse, pearson_r, rmse};
}

// Re-export main types at crate root for convenience
pub use config::TcnnConfig;
pub use error::{Result, TcnnError};
pub use tcn::{ModelInputs, ModelOutput, Tcnn};
