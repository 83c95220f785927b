//! Utility functions

pub mod metrics;

pub use metrics::{kge, mae, nse, pearson_r, rmse};
