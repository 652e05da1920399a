//! Error types for contour generation.

use thiserror::Error;

/// Result type for contour operations.
pub type ContourResult<T> = Result<T, ContourError>;

#[derive(Debug, Error)]
pub enum ContourError {
    #[error("Invalid contour levels: {0}")]
    InvalidLevels(String),

    #[error("Grid shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid mesh topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid geometry at level {level}: {message}")]
    InvalidGeometry { level: f64, message: String },
}
