//! Error types for dataset loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for dataset loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised while opening or reading a dataset.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Dataset not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    #[error("Variable not found in dataset: {0}")]
    MissingVariable(String),

    #[error("No coordinate variables found (tried {0})")]
    MissingCoordinates(String),

    #[error("Variable {0} has no time dimension")]
    MissingTimeDimension(String),

    #[error("Time index {index} out of range for {variable} ({count} steps)")]
    TimeIndexOutOfRange {
        variable: String,
        index: usize,
        count: usize,
    },

    #[error("Shape mismatch for {variable}: {message}")]
    ShapeMismatch { variable: String, message: String },

    #[error("Invalid time encoding: {0}")]
    InvalidTime(String),

    #[error(transparent)]
    Manifest(#[from] psa_common::ManifestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),
}
