//! Error types for the geometry store.

use chrono::{DateTime, Utc};
use psa_common::{GeoJsonError, RegistryError};
use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Two records with the same key could not be combined.
    #[error("Cannot merge record {variable_id} at {} value {value}: {reason}", fmt_date(.date))]
    MergeConflict {
        variable_id: Uuid,
        date: Option<DateTime<Utc>>,
        value: f64,
        reason: String,
    },

    #[error("Stored geometry is invalid: {0}")]
    Geometry(#[from] GeoJsonError),

    #[error("Stored variable is not in the registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn fmt_date(date: &Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "snapshot".to_string(), |d| d.to_rfc3339())
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}
