//! Native NetCDF reading via the netcdf crate.
//!
//! Each variable is read once in full and cached; time slices are cut from
//! the cached array. Fill values and NaN become nulls and CF packing
//! (`scale_factor`, `add_offset`) is applied on read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::field::{value_domain, Field, RawArray};
use crate::time::decode_times;
use crate::{Coordinates, DatasetReader, COORDINATE_CANDIDATES};

/// Silence HDF5's automatic error printing to stderr.
///
/// Probing for optional attributes otherwise prints HDF5-DIAG noise even
/// though the missing attribute is handled. Safe to call more than once.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with null handlers is a documented way to
        // disable the default error stack printer.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// A NetCDF file opened lazily per read.
pub struct NetCdfDataset {
    path: PathBuf,
    cache: Mutex<HashMap<String, Arc<RawArray>>>,
}

impl NetCdfDataset {
    pub fn open(path: &Path) -> LoadResult<Self> {
        silence_hdf5_errors();
        let dataset = Self {
            path: path.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        };
        // Fail early if the file is not NetCDF.
        dataset.file()?;
        Ok(dataset)
    }

    fn file(&self) -> LoadResult<netcdf::File> {
        netcdf::open(&self.path).map_err(|e| LoadError::Unreadable {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn unreadable(&self, message: String) -> LoadError {
        LoadError::Unreadable {
            path: self.path.clone(),
            message,
        }
    }

    fn read(&self, name: &str) -> LoadResult<Arc<RawArray>> {
        if let Some(cached) = self.cache.lock().ok().and_then(|c| c.get(name).cloned()) {
            return Ok(cached);
        }

        let file = self.file()?;
        let var = file
            .variable(name)
            .ok_or_else(|| LoadError::MissingVariable(name.to_string()))?;

        let dims = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect::<Vec<_>>();

        let raw: Vec<f64> = var
            .get_values(..)
            .map_err(|e| self.unreadable(format!("Failed to read {}: {}", name, e)))?;

        let fill_value = get_f64_attr(&var, "_FillValue").or_else(|| get_f64_attr(&var, "missing_value"));
        let scale_factor = get_f64_attr(&var, "scale_factor").unwrap_or(1.0);
        let add_offset = get_f64_attr(&var, "add_offset").unwrap_or(0.0);

        let values = raw
            .into_iter()
            .map(|v| {
                if v.is_nan() || fill_value.map_or(false, |fill| v == fill) {
                    f64::NAN
                } else {
                    v * scale_factor + add_offset
                }
            })
            .collect::<Vec<_>>();

        debug!(variable = name, dims = ?dims, values = values.len(), "Read NetCDF variable");

        let array = Arc::new(RawArray { dims, values });
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name.to_string(), array.clone());
        }
        Ok(array)
    }
}

impl DatasetReader for NetCdfDataset {
    fn variable_names(&self) -> Vec<String> {
        self.file()
            .map(|f| f.variables().map(|v| v.name()).collect())
            .unwrap_or_default()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file().map_or(false, |f| f.variable(name).is_some())
    }

    fn times(&self) -> LoadResult<Vec<DateTime<Utc>>> {
        let file = self.file()?;
        let Some(var) = file.variable("time") else {
            return Ok(Vec::new());
        };
        let units = get_string_attr(&var, "units")
            .ok_or_else(|| LoadError::InvalidTime("time variable has no units".to_string()))?;
        let values: Vec<f64> = var
            .get_values(..)
            .map_err(|e| self.unreadable(format!("Failed to read time: {}", e)))?;
        decode_times(&values, &units)
    }

    fn has_time_dimension(&self, name: &str) -> LoadResult<bool> {
        let file = self.file()?;
        let var = file
            .variable(name)
            .ok_or_else(|| LoadError::MissingVariable(name.to_string()))?;
        let first = var.dimensions().first().map(|d| d.name());
        Ok(first.map_or(false, |n| crate::field::is_time_dimension(&n)))
    }

    fn field(&self, name: &str, time_index: Option<usize>) -> LoadResult<Field> {
        self.read(name)?.slice(name, time_index)
    }

    fn value_range(&self, name: &str) -> LoadResult<Option<(f64, f64)>> {
        Ok(value_domain(&self.read(name)?.values))
    }

    fn coordinates(&self) -> LoadResult<Coordinates> {
        let file = self.file()?;
        let (x_name, y_name) = COORDINATE_CANDIDATES
            .iter()
            .find(|(x, y)| file.variable(x).is_some() && file.variable(y).is_some())
            .ok_or_else(|| LoadError::MissingCoordinates(crate::coordinate_candidates_list()))?;
        Ok(Coordinates {
            x: self.read(x_name)?.values.clone(),
            y: self.read(y_name)?.values.clone(),
        })
    }

    fn connectivity(&self, topology: &str) -> LoadResult<Vec<Vec<i64>>> {
        let file = self.file()?;
        let var = file
            .variable(topology)
            .ok_or_else(|| LoadError::MissingVariable(topology.to_string()))?;
        let dims = var.dimensions();
        let nodes_per_face = match dims {
            [_, nodes] => nodes.len(),
            _ => {
                return Err(LoadError::ShapeMismatch {
                    variable: topology.to_string(),
                    message: format!("expected [face, node] dimensions, found {}", dims.len()),
                })
            }
        };
        let fill = get_f64_attr(&var, "_FillValue").map(|f| f as i64);
        let raw: Vec<i64> = var
            .get_values(..)
            .map_err(|e| self.unreadable(format!("Failed to read {}: {}", topology, e)))?;

        Ok(raw
            .chunks(nodes_per_face.max(1))
            .map(|face| {
                face.iter()
                    .map(|&n| if Some(n) == fill { -1 } else { n })
                    .collect()
            })
            .collect())
    }
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
