//! Error types for the ingestion crate.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use contour::ContourError;
use dataset_loader::LoadError;
use psa_common::RegistryError;
use storage::StorageError;
use thiserror::Error;

fn at(date: &Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => format!(" at {}", date.to_rfc3339()),
        None => String::new(),
    }
}

/// Errors that abort an ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to open dataset {}: {source}", .path.display())]
    Load { path: PathBuf, source: LoadError },

    #[error("Failed to read {variable}{}: {source}", at(.date))]
    Field {
        variable: String,
        date: Option<DateTime<Utc>>,
        source: LoadError,
    },

    #[error(transparent)]
    UnknownVariable(#[from] RegistryError),

    #[error("Failed to contour {variable}{}: {source}", at(.date))]
    Contour {
        variable: String,
        date: Option<DateTime<Utc>>,
        source: ContourError,
    },

    #[error("Failed to store {variable}{}: {source}", at(.date))]
    Storage {
        variable: String,
        date: Option<DateTime<Utc>>,
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StorageError),

    #[error("Invalid stage transition for {variable}{}: {from} -> {to}", at(.date))]
    StageTransition {
        variable: String,
        date: Option<DateTime<Utc>>,
        from: &'static str,
        to: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestionError {
    /// Variable the failure belongs to, for targeted retries.
    pub fn variable(&self) -> Option<&str> {
        match self {
            IngestionError::Field { variable, .. }
            | IngestionError::Contour { variable, .. }
            | IngestionError::Storage { variable, .. }
            | IngestionError::StageTransition { variable, .. } => Some(variable),
            IngestionError::UnknownVariable(RegistryError::UnknownVariable(name)) => Some(name),
            _ => None,
        }
    }

    /// Timestamp the failure belongs to; `None` for snapshots and
    /// dataset-level failures.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            IngestionError::Field { date, .. }
            | IngestionError::Contour { date, .. }
            | IngestionError::Storage { date, .. }
            | IngestionError::StageTransition { date, .. } => *date,
            _ => None,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_context_in_message() {
        let date = Utc.with_ymd_and_hms(2018, 9, 14, 1, 0, 0).unwrap();
        let err = IngestionError::Field {
            variable: "water_level".to_string(),
            date: Some(date),
            source: LoadError::MissingVariable("water_level".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("water_level at 2018-09-14T01:00:00+00:00"), "{}", message);
        assert_eq!(err.variable(), Some("water_level"));
        assert_eq!(err.date(), Some(date));
    }

    #[test]
    fn test_unknown_variable_context() {
        let err: IngestionError = RegistryError::UnknownVariable("salinity".to_string()).into();
        assert_eq!(err.variable(), Some("salinity"));
        assert_eq!(err.date(), None);
    }
}
