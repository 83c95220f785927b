//! Feature Scaling Utilities

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::{Result, TcnnError};

/// Normalization method enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// Z-score normalization (mean=0, std=1)
    ZScore,
    /// Min-max normalization to [0, 1]
    MinMax,
    /// No normalization
    None,
}

/// Per-feature scaler for [time, features] data
///
/// Missing values are ignored when fitting and stay missing after
/// transformation, so windowing can still drop them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureScaler {
    /// Normalization method
    pub method: NormalizationMethod,
    /// Fitted statistics
    stats: Option<ScalerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerStats {
    means: Vec<f64>,
    stds: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl Default for FeatureScaler {
    fn default() -> Self {
        Self::new(NormalizationMethod::ZScore)
    }
}

impl FeatureScaler {
    /// Create a new scaler
    pub fn new(method: NormalizationMethod) -> Self {
        Self { method, stats: None }
    }

    /// Create a Z-score scaler
    pub fn zscore() -> Self {
        Self::new(NormalizationMethod::ZScore)
    }

    /// Create a Min-Max scaler
    pub fn minmax() -> Self {
        Self::new(NormalizationMethod::MinMax)
    }

    pub fn is_fitted(&self) -> bool {
        self.stats.is_some()
    }

    /// Number of features seen by `fit`
    pub fn num_features(&self) -> Option<usize> {
        self.stats.as_ref().map(|s| s.means.len())
    }

    /// Compute per-feature statistics
    pub fn fit(&mut self, data: &Array2<f64>) {
        let features = data.ncols();
        let mut stats = ScalerStats {
            means: Vec::with_capacity(features),
            stds: Vec::with_capacity(features),
            mins: Vec::with_capacity(features),
            maxs: Vec::with_capacity(features),
        };

        for column in data.columns() {
            let values: Vec<f64> = column.iter().filter(|x| !x.is_nan()).cloned().collect();

            if values.is_empty() {
                stats.means.push(0.0);
                stats.stds.push(1.0);
                stats.mins.push(0.0);
                stats.maxs.push(1.0);
                continue;
            }

            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance =
                values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;

            stats.means.push(mean);
            stats.stds.push(variance.sqrt().max(1e-10));
            stats.mins.push(values.iter().cloned().fold(f64::INFINITY, f64::min));
            stats.maxs.push(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
        }

        self.stats = Some(stats);
    }

    /// Fit the scaler to data and transform
    pub fn fit_transform(&mut self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(data);
        self.transform(data)
    }

    /// Transform data using previously fitted statistics
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let stats = self.fitted(data.ncols())?;
        let mut result = data.clone();

        for (i, mut column) in result.columns_mut().into_iter().enumerate() {
            column.mapv_inplace(|val| match self.method {
                NormalizationMethod::ZScore => (val - stats.means[i]) / stats.stds[i],
                NormalizationMethod::MinMax => {
                    let range = stats.maxs[i] - stats.mins[i];
                    if range > 1e-10 {
                        (val - stats.mins[i]) / range
                    } else {
                        0.5
                    }
                }
                NormalizationMethod::None => val,
            });
        }

        Ok(result)
    }

    /// Map scaled values of feature `index` back to physical units
    pub fn inverse_transform_column(&self, values: ArrayView1<f64>, index: usize) -> Result<Array1<f64>> {
        let stats = self.stats.as_ref().ok_or_else(not_fitted)?;
        if index >= stats.means.len() {
            return Err(TcnnError::shape("scaler feature index", format!("< {}", stats.means.len()), index));
        }

        Ok(values.mapv(|val| match self.method {
            NormalizationMethod::ZScore => val * stats.stds[index] + stats.means[index],
            NormalizationMethod::MinMax => val * (stats.maxs[index] - stats.mins[index]) + stats.mins[index],
            NormalizationMethod::None => val,
        }))
    }

    /// Save the fitted scaler as JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a scaler saved with [`FeatureScaler::save_json`]
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    fn fitted(&self, features: usize) -> Result<&ScalerStats> {
        let stats = self.stats.as_ref().ok_or_else(not_fitted)?;
        if stats.means.len() != features {
            return Err(TcnnError::shape("scaler features", stats.means.len(), features));
        }
        Ok(stats)
    }
}

fn not_fitted() -> TcnnError {
    TcnnError::InvalidConfig("scaler used before fit".to_string())
}
