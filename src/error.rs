//! Error types for the TCNN library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, TcnnError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum TcnnError {
    /// Invalid model or data configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor shape does not match what a layer expects
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        got: String,
    },

    /// Input sequence is shorter than the sliced output window
    #[error("Sequence of length {seq_len} is shorter than the output window {window}")]
    SequenceTooShort { seq_len: usize, window: usize },

    /// A named column is absent from a data file
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Basin id not present in the basin list or attribute table
    #[error("Unknown basin: {0}")]
    UnknownBasin(String),

    /// Cell or value could not be parsed
    #[error("Failed to parse data: {0}")]
    Parse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ndarray reshape error
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl TcnnError {
    pub(crate) fn shape(context: &'static str, expected: impl ToString, got: impl ToString) -> Self {
        TcnnError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
