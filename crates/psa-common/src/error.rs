//! Error types for registry lookups and manifest validation.

use thiserror::Error;

/// Raised when a variable name is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
}

/// Raised when a dataset manifest is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("Manifest lists no variables for {0}")]
    NoVariables(String),

    #[error("Unsupported topology start index {0} (expected 0 or 1)")]
    InvalidStartIndex(u8),

    #[error("Unstructured dataset {0} is missing a topology variable name")]
    MissingTopology(String),
}
