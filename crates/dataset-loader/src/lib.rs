//! Dataset loading for hazard simulation output.
//!
//! Opens the file named by a [`ManifestDataset`] and exposes named fields
//! (optionally sliced by time step), coordinate arrays and mesh connectivity
//! through the [`DatasetReader`] trait.
//!
//! # Formats
//!
//! - `.nc`, `.nc4`, `.netcdf`: NetCDF, read natively when the `netcdf`
//!   feature is enabled
//! - `.json`: a serialized [`MemoryDataset`]

use std::path::Path;

use chrono::{DateTime, Utc};
use psa_common::ManifestDataset;
use tracing::info;

mod error;
pub mod field;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod native;
pub mod time;

pub use error::{LoadError, LoadResult};
pub use field::{value_domain, Field, FieldShape};
pub use memory::{MemoryDataset, MemoryVariable};
#[cfg(feature = "netcdf")]
pub use native::NetCdfDataset;

/// Coordinate variable pairs, tried in order.
pub const COORDINATE_CANDIDATES: &[(&str, &str)] = &[
    ("lon", "lat"),
    ("longitude", "latitude"),
    ("x", "y"),
    ("mesh2d_node_x", "mesh2d_node_y"),
];

pub(crate) fn coordinate_candidates_list() -> String {
    COORDINATE_CANDIDATES
        .iter()
        .map(|(x, y)| format!("{}/{}", x, y))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coordinate arrays in WGS84 degrees.
///
/// For structured grids these are the 1-D axes; for meshes they are per-node.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Read access to one opened dataset.
pub trait DatasetReader: Send + Sync {
    fn variable_names(&self) -> Vec<String>;

    fn has_variable(&self, name: &str) -> bool;

    /// Decoded time axis; empty when the dataset has none.
    fn times(&self) -> LoadResult<Vec<DateTime<Utc>>>;

    fn has_time_dimension(&self, name: &str) -> LoadResult<bool>;

    /// One spatial slice of a variable. `None` selects the first step.
    fn field(&self, name: &str, time_index: Option<usize>) -> LoadResult<Field>;

    /// `(min, max)` over all steps, ignoring nulls.
    fn value_range(&self, name: &str) -> LoadResult<Option<(f64, f64)>>;

    fn coordinates(&self) -> LoadResult<Coordinates>;

    /// Raw face-to-node table, in the file's own index base.
    fn connectivity(&self, topology: &str) -> LoadResult<Vec<Vec<i64>>>;
}

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    NetCdf,
    Json,
    Unknown,
}

/// Detect the dataset format from the file extension.
pub fn detect_format(path: &Path) -> DatasetFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "nc" | "nc4" | "netcdf" => DatasetFormat::NetCdf,
        "json" => DatasetFormat::Json,
        _ => DatasetFormat::Unknown,
    }
}

/// Open the file named by a manifest.
///
/// Validates the manifest, opens the file in the detected format and
/// verifies that the connectivity variable is present for meshes.
/// Registry variables missing from the file are reported later, per variable.
pub fn open_dataset(manifest: &ManifestDataset) -> LoadResult<Box<dyn DatasetReader>> {
    manifest.validate()?;

    let path = manifest.path();
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }

    let reader: Box<dyn DatasetReader> = match detect_format(path) {
        DatasetFormat::Json => Box::new(MemoryDataset::from_json_file(path)?),
        DatasetFormat::NetCdf => open_netcdf(path)?,
        DatasetFormat::Unknown => {
            return Err(LoadError::UnsupportedFormat(path.display().to_string()))
        }
    };

    if let psa_common::GridKind::Unstructured { topology, .. } = &manifest.grid {
        if !reader.has_variable(topology) {
            return Err(LoadError::MissingVariable(topology.clone()));
        }
    }

    info!(
        path = %path.display(),
        variables = reader.variable_names().len(),
        "Opened dataset"
    );
    Ok(reader)
}

#[cfg(feature = "netcdf")]
fn open_netcdf(path: &Path) -> LoadResult<Box<dyn DatasetReader>> {
    Ok(Box::new(NetCdfDataset::open(path)?))
}

#[cfg(not(feature = "netcdf"))]
fn open_netcdf(path: &Path) -> LoadResult<Box<dyn DatasetReader>> {
    tracing::debug!(path = %path.display(), "NetCDF support not compiled in");
    Err(LoadError::UnsupportedFormat(format!(
        "{} (built without the netcdf feature)",
        path.display()
    )))
}
