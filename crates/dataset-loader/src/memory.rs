//! In-memory datasets.
//!
//! A [`MemoryDataset`] holds everything a reader needs in plain vectors. It
//! serializes to JSON, which is the on-disk format used for fixtures and small
//! synthetic runs (`.json` manifests).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::field::{Field, RawArray};
use crate::{Coordinates, DatasetReader};

/// One variable: spatial shape, whether it is time-major, and its values.
///
/// `values` is flattened row-major with the time axis first when `time` is set.
/// `null` entries are missing cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryVariable {
    #[serde(default)]
    pub time: bool,
    pub shape: Vec<usize>,
    pub values: Vec<Option<f64>>,
}

/// A complete dataset held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDataset {
    #[serde(default)]
    pub times: Vec<DateTime<Utc>>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    #[serde(default)]
    pub variables: BTreeMap<String, MemoryVariable>,
    /// Face-to-node connectivity tables, keyed by topology variable name.
    /// Values use whatever index base the manifest declares.
    #[serde(default)]
    pub topologies: BTreeMap<String, Vec<Vec<i64>>>,
}

impl MemoryDataset {
    /// Dataset with the given x/y coordinates (axes for grids, nodes for meshes).
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_times(mut self, times: Vec<DateTime<Utc>>) -> Self {
        self.times = times;
        self
    }

    /// Add a single-step grid variable shaped `[y, x]`.
    pub fn with_grid_variable(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        let shape = vec![self.y.len(), self.x.len()];
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                time: false,
                shape,
                values,
            },
        );
        self
    }

    /// Add a time-major grid variable, one `[y, x]` slice per time step.
    pub fn with_grid_series(mut self, name: &str, steps: Vec<Vec<Option<f64>>>) -> Self {
        let shape = vec![self.y.len(), self.x.len()];
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                time: true,
                shape,
                values: steps.into_iter().flatten().collect(),
            },
        );
        self
    }

    /// Add a single-step per-node variable.
    pub fn with_node_variable(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        let shape = vec![self.x.len()];
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                time: false,
                shape,
                values,
            },
        );
        self
    }

    /// Add a time-major per-node variable.
    pub fn with_node_series(mut self, name: &str, steps: Vec<Vec<Option<f64>>>) -> Self {
        let shape = vec![self.x.len()];
        self.variables.insert(
            name.to_string(),
            MemoryVariable {
                time: true,
                shape,
                values: steps.into_iter().flatten().collect(),
            },
        );
        self
    }

    pub fn with_topology(mut self, name: &str, faces: Vec<Vec<i64>>) -> Self {
        self.topologies.insert(name.to_string(), faces);
        self
    }

    pub fn from_json_file(path: &Path) -> LoadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let dataset: Self = serde_json::from_str(&text)?;
        dataset.check()?;
        Ok(dataset)
    }

    pub fn write_json_file(&self, path: &Path) -> LoadResult<()> {
        std::fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    /// Verify every variable's value count matches its declared shape.
    pub fn check(&self) -> LoadResult<()> {
        for (name, var) in &self.variables {
            let steps = if var.time { self.times.len() } else { 1 };
            let expected = steps * var.shape.iter().product::<usize>();
            if var.values.len() != expected {
                return Err(LoadError::ShapeMismatch {
                    variable: name.clone(),
                    message: format!("{} values, expected {}", var.values.len(), expected),
                });
            }
        }
        Ok(())
    }

    fn variable(&self, name: &str) -> LoadResult<&MemoryVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| LoadError::MissingVariable(name.to_string()))
    }

    fn raw(&self, name: &str) -> LoadResult<RawArray> {
        let var = self.variable(name)?;
        let mut dims = Vec::with_capacity(var.shape.len() + 1);
        if var.time {
            dims.push(("time".to_string(), self.times.len()));
        }
        let spatial_names: &[&str] = if var.shape.len() == 2 { &["y", "x"] } else { &["node"] };
        dims.extend(
            spatial_names
                .iter()
                .zip(&var.shape)
                .map(|(n, len)| (n.to_string(), *len)),
        );
        Ok(RawArray {
            dims,
            values: var.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
        })
    }
}

impl DatasetReader for MemoryDataset {
    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.topologies.contains_key(name)
    }

    fn times(&self) -> LoadResult<Vec<DateTime<Utc>>> {
        Ok(self.times.clone())
    }

    fn has_time_dimension(&self, name: &str) -> LoadResult<bool> {
        Ok(self.variable(name)?.time)
    }

    fn field(&self, name: &str, time_index: Option<usize>) -> LoadResult<Field> {
        self.raw(name)?.slice(name, time_index)
    }

    fn value_range(&self, name: &str) -> LoadResult<Option<(f64, f64)>> {
        Ok(crate::field::value_domain(&self.raw(name)?.values))
    }

    fn coordinates(&self) -> LoadResult<Coordinates> {
        if self.x.is_empty() || self.y.is_empty() {
            return Err(LoadError::MissingCoordinates("x/y".to_string()));
        }
        Ok(Coordinates {
            x: self.x.clone(),
            y: self.y.clone(),
        })
    }

    fn connectivity(&self, topology: &str) -> LoadResult<Vec<Vec<i64>>> {
        self.topologies
            .get(topology)
            .cloned()
            .ok_or_else(|| LoadError::MissingVariable(topology.to_string()))
    }
}
