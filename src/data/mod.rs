//! Data preparation for model inputs
//!
//! - `timeseries` - Basin CSV loading and sliding windows
//! - `normalize` - Per-feature scaling
//! - `basin` - One-hot basin encoding and catchment attributes

mod basin;
mod normalize;
mod timeseries;

pub use basin::{AttributeTable, BasinEncoder};
pub use normalize::{FeatureScaler, NormalizationMethod};
pub use timeseries::{sliding_windows, TimeSeries, Windows};
