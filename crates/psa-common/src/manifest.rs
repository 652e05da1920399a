//! Dataset manifests: which file to read, how its grid is laid out, and
//! which variables to ingest from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Spatial layout of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridKind {
    /// Rectilinear grid: 1-D x and y axes, fields shaped `[y, x]`.
    Structured,
    /// Triangular (or polygonal) mesh with node coordinates and a
    /// face-to-node connectivity variable.
    Unstructured {
        /// Name of the connectivity variable.
        topology: String,
        /// Index base of the connectivity values, 0 or 1.
        start_index: u8,
    },
}

/// One raw output file to ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDataset {
    pub path: PathBuf,
    pub grid: GridKind,
    pub variables: Vec<String>,
}

impl ManifestDataset {
    pub fn structured(path: impl Into<PathBuf>, variables: &[&str]) -> Self {
        Self {
            path: path.into(),
            grid: GridKind::Structured,
            variables: variables.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn unstructured(
        path: impl Into<PathBuf>,
        topology: impl Into<String>,
        start_index: u8,
        variables: &[&str],
    ) -> Self {
        Self {
            path: path.into(),
            grid: GridKind::Unstructured {
                topology: topology.into(),
                start_index,
            },
            variables: variables.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_structured(&self) -> bool {
        matches!(self.grid, GridKind::Structured)
    }

    /// Structural checks that do not need to open the file.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.variables.is_empty() {
            return Err(ManifestError::NoVariables(self.path.display().to_string()));
        }
        if let GridKind::Unstructured {
            topology,
            start_index,
        } = &self.grid
        {
            if topology.trim().is_empty() {
                return Err(ManifestError::MissingTopology(self.path.display().to_string()));
            }
            if *start_index > 1 {
                return Err(ManifestError::InvalidStartIndex(*start_index));
            }
        }
        Ok(())
    }
}
