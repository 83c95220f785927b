//! Basin identity encoding and static catchment attributes

use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;
use std::path::Path;

use super::normalize::FeatureScaler;
use crate::error::{Result, TcnnError};

/// Ordered list of basin ids used for the one-hot encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasinEncoder {
    basins: Vec<String>,
}

impl BasinEncoder {
    pub fn new(basins: Vec<String>) -> Self {
        Self { basins }
    }

    /// Read one basin id per line, skipping blank lines and `#` comments
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let basins = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();
        Ok(Self::new(basins))
    }

    pub fn len(&self) -> usize {
        self.basins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basins.is_empty()
    }

    pub fn index_of(&self, basin: &str) -> Option<usize> {
        self.basins.iter().position(|b| b == basin)
    }

    /// One-hot vector of length `len()`
    pub fn encode(&self, basin: &str) -> Result<Array1<f64>> {
        let index = self
            .index_of(basin)
            .ok_or_else(|| TcnnError::UnknownBasin(basin.to_string()))?;
        let mut one_hot = Array1::zeros(self.basins.len());
        one_hot[index] = 1.0;
        Ok(one_hot)
    }

    /// The same one-hot row repeated for every sample of a batch
    pub fn encode_batch(&self, basin: &str, batch: usize) -> Result<Array2<f64>> {
        Ok(repeat_rows(&self.encode(basin)?, batch))
    }
}

/// Static attributes per basin, columns selected by name
#[derive(Debug, Clone)]
pub struct AttributeTable {
    pub columns: Vec<String>,
    rows: HashMap<String, Array1<f64>>,
}

impl AttributeTable {
    /// Read `columns` from a CSV keyed by `id_column`
    pub fn from_csv<P: AsRef<Path>>(path: P, id_column: &str, columns: &[String]) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TcnnError::MissingColumn(name.to_string()))
        };

        let id_position = position(id_column)?;
        let positions = columns
            .iter()
            .map(|c| position(c))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let id = record.get(id_position).unwrap_or("").trim().to_string();
            let values = positions
                .iter()
                .zip(columns)
                .map(|(&pos, name)| {
                    let cell = record.get(pos).unwrap_or("").trim();
                    cell.parse::<f64>()
                        .map_err(|_| TcnnError::Parse(format!("basin {id}, attribute {name}: {cell:?}")))
                })
                .collect::<Result<Array1<f64>>>()?;
            rows.insert(id, values);
        }

        Ok(Self {
            columns: columns.to_vec(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Attribute vector of one basin
    pub fn get(&self, basin: &str) -> Result<&Array1<f64>> {
        self.rows
            .get(basin)
            .ok_or_else(|| TcnnError::UnknownBasin(basin.to_string()))
    }

    /// Z-score every attribute across the basins in the table
    pub fn standardize(&mut self) -> Result<()> {
        let ids: Vec<String> = self.rows.keys().cloned().collect();
        let mut stacked = Array2::zeros((ids.len(), self.columns.len()));
        for (mut row, id) in stacked.axis_iter_mut(Axis(0)).zip(&ids) {
            row.assign(&self.rows[id]);
        }

        let scaled = FeatureScaler::zscore().fit_transform(&stacked)?;
        for (row, id) in scaled.axis_iter(Axis(0)).zip(ids) {
            self.rows.insert(id, row.to_owned());
        }
        Ok(())
    }

    /// Attribute row of one basin repeated for every sample of a batch
    pub fn batch(&self, basin: &str, batch: usize) -> Result<Array2<f64>> {
        Ok(repeat_rows(self.get(basin)?, batch))
    }
}

fn repeat_rows(row: &Array1<f64>, batch: usize) -> Array2<f64> {
    let mut out = Array2::zeros((batch, row.len()));
    for mut r in out.axis_iter_mut(Axis(0)) {
        r.assign(row);
    }
    out
}
