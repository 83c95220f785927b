//! Basin time series loading and windowing

use ndarray::{s, Array2, Array3, ArrayView1, Axis};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TcnnError};

/// Named columns of one basin's daily record, laid out as [time, features]
#[derive(Debug, Clone)]
pub struct TimeSeries {
    /// Column names in the order of `values`' second axis
    pub columns: Vec<String>,
    /// Values [time, features], missing cells are NaN
    pub values: Array2<f64>,
    /// Optional row labels, e.g. dates
    pub index: Vec<String>,
}

impl TimeSeries {
    /// Read the named columns of a CSV file
    ///
    /// Blank cells and `NaN`/`nan` are read as missing values.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        columns: &[String],
        index_column: Option<&str>,
    ) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();

        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| TcnnError::MissingColumn(name.to_string()))
        };
        let positions = columns
            .iter()
            .map(|c| position(c))
            .collect::<Result<Vec<_>>>()?;
        let index_position = index_column.map(position).transpose()?;

        let mut flat = Vec::new();
        let mut index = Vec::new();
        let mut rows = 0;

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (&pos, name) in positions.iter().zip(columns) {
                let cell = record.get(pos).unwrap_or("");
                flat.push(parse_cell(cell).ok_or_else(|| {
                    TcnnError::Parse(format!("row {}, column {name}: {cell:?}", row + 1))
                })?);
            }
            if let Some(pos) = index_position {
                index.push(record.get(pos).unwrap_or("").to_string());
            }
            rows += 1;
        }

        let values = Array2::from_shape_vec((rows, columns.len()), flat)?;
        debug!(
            path = %path.as_ref().display(),
            rows,
            columns = columns.len(),
            "read time series"
        );

        Ok(Self {
            columns: columns.to_vec(),
            values,
            index,
        })
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// View of a single named column
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values.column(i))
    }

    /// New series with only the named columns, in the given order
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let positions = names
            .iter()
            .map(|n| {
                self.columns
                    .iter()
                    .position(|c| c == n)
                    .ok_or_else(|| TcnnError::MissingColumn(n.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            columns: names.to_vec(),
            values: self.values.select(Axis(1), &positions),
            index: self.index.clone(),
        })
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

/// Input windows cut from a series
#[derive(Debug, Clone)]
pub struct Windows {
    /// Windows [n_windows, seq_length, features]
    pub x: Array3<f64>,
    /// Row index of the last step of every window
    pub end_index: Vec<usize>,
}

impl Windows {
    pub fn len(&self) -> usize {
        self.end_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.end_index.is_empty()
    }

    /// Windows `start..end` as a new batch
    pub fn batch(&self, start: usize, end: usize) -> Array3<f64> {
        let end = end.min(self.len());
        let start = start.min(end);
        self.x.slice(s![start..end, .., ..]).to_owned()
    }
}

/// Cut `[time, features]` data into overlapping windows of `seq_length`
///
/// Windows advance by `stride` steps. Windows that contain a missing value
/// are dropped.
pub fn sliding_windows(data: &Array2<f64>, seq_length: usize, stride: usize) -> Result<Windows> {
    if seq_length == 0 || stride == 0 {
        return Err(TcnnError::InvalidConfig(
            "seq_length and stride must be positive".to_string(),
        ));
    }
    let (steps, features) = data.dim();

    let starts: Vec<usize> = if steps < seq_length {
        Vec::new()
    } else {
        (0..=steps - seq_length)
            .step_by(stride)
            .filter(|&start| {
                data.slice(s![start..start + seq_length, ..])
                    .iter()
                    .all(|v| !v.is_nan())
            })
            .collect()
    };

    let x = Array3::from_shape_fn((starts.len(), seq_length, features), |(i, t, f)| {
        data[[starts[i] + t, f]]
    });
    let end_index = starts.iter().map(|s| s + seq_length - 1).collect();

    Ok(Windows { x, end_index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_named_columns() {
        let file = write_csv(
            "date,prcp,tmax,QObs\n\
             2000-01-01,1.5,10.0,0.3\n\
             2000-01-02,,11.0,0.4\n\
             2000-01-03,0.0,NaN,0.5\n",
        );
        let columns = vec!["tmax".to_string(), "prcp".to_string()];
        let series = TimeSeries::from_csv(file.path(), &columns, Some("date")).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.values[[0, 0]], 10.0);
        assert_eq!(series.values[[0, 1]], 1.5);
        assert!(series.values[[1, 1]].is_nan());
        assert!(series.values[[2, 0]].is_nan());
        assert_eq!(series.index[2], "2000-01-03");
        assert_eq!(series.column("prcp").unwrap()[2], 0.0);
    }

    #[test]
    fn test_missing_and_bad_cells() {
        let file = write_csv("prcp,tmax\n1.0,abc\n");
        let missing = TimeSeries::from_csv(file.path(), &["vp".to_string()], None);
        assert!(matches!(missing, Err(TcnnError::MissingColumn(c)) if c == "vp"));

        let bad = TimeSeries::from_csv(file.path(), &["tmax".to_string()], None);
        assert!(matches!(bad, Err(TcnnError::Parse(_))));
    }

    #[test]
    fn test_select_columns() {
        let series = TimeSeries {
            columns: vec!["a".into(), "b".into(), "c".into()],
            values: Array2::from_shape_fn((4, 3), |(t, f)| (t * 10 + f) as f64),
            index: Vec::new(),
        };
        let picked = series.select(&["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(picked.values[[2, 0]], 22.0);
        assert_eq!(picked.values[[2, 1]], 20.0);
        assert!(series.select(&["z".to_string()]).is_err());
    }

    #[test]
    fn test_sliding_windows() {
        let data = Array2::from_shape_fn((10, 2), |(t, f)| (t * 2 + f) as f64);
        let windows = sliding_windows(&data, 4, 2).unwrap();

        assert_eq!(windows.x.dim(), (4, 4, 2));
        assert_eq!(windows.end_index, vec![3, 5, 7, 9]);
        assert_eq!(windows.x[[1, 0, 0]], 4.0);
        assert_eq!(windows.batch(1, 3).dim(), (2, 4, 2));
        assert_eq!(windows.batch(3, 10).dim(), (1, 4, 2));
    }

    #[test]
    fn test_windows_skip_missing() {
        let mut data = Array2::ones((8, 1));
        data[[4, 0]] = f64::NAN;
        let windows = sliding_windows(&data, 3, 1).unwrap();
        // Only windows ending at 2, 3 and 7 avoid step 4
        assert_eq!(windows.end_index, vec![2, 3, 7]);
    }

    #[test]
    fn test_windows_short_series() {
        let windows = sliding_windows(&Array2::ones((2, 3)), 5, 1).unwrap();
        assert!(windows.is_empty());
        assert_eq!(windows.x.dim(), (0, 5, 3));
        assert!(sliding_windows(&Array2::ones((2, 3)), 0, 1).is_err());
    }
}
