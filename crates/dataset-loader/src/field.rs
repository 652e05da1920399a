//! Field values extracted from a dataset.

use crate::error::{LoadError, LoadResult};

/// Layout of a field's spatial dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Row-major `[y, x]` grid.
    Grid { rows: usize, cols: usize },
    /// One value per mesh node.
    Nodes(usize),
}

impl FieldShape {
    pub fn len(&self) -> usize {
        match *self {
            FieldShape::Grid { rows, cols } => rows * cols,
            FieldShape::Nodes(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A 2-D scalar field for one time step. Null cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: FieldShape,
    pub values: Vec<f64>,
}

impl Field {
    pub fn new(name: impl Into<String>, shape: FieldShape, values: Vec<f64>) -> LoadResult<Self> {
        let name = name.into();
        if values.len() != shape.len() {
            return Err(LoadError::ShapeMismatch {
                message: format!("{} values for shape {:?}", values.len(), shape),
                variable: name,
            });
        }
        Ok(Self {
            name,
            shape,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).map_or(true, |v| v.is_nan())
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// `(min, max)` of the non-null values, `None` when fully masked.
    pub fn domain(&self) -> Option<(f64, f64)> {
        value_domain(&self.values)
    }
}

/// `(min, max)` of the non-NaN values.
pub fn value_domain(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub(crate) fn is_time_dimension(name: &str) -> bool {
    matches!(name, "time" | "t")
}

/// A variable as read from storage: named dimensions and flat row-major values.
#[derive(Debug, Clone)]
pub(crate) struct RawArray {
    pub dims: Vec<(String, usize)>,
    pub values: Vec<f64>,
}

impl RawArray {
    pub fn has_time(&self) -> bool {
        self.dims
            .first()
            .map_or(false, |(name, _)| is_time_dimension(name))
    }

    /// Extract one time step. Without a time index the first step is used.
    pub fn slice(&self, variable: &str, time_index: Option<usize>) -> LoadResult<Field> {
        let (spatial, offset) = if self.has_time() {
            let count = self.dims[0].1;
            let index = time_index.unwrap_or(0);
            if index >= count {
                return Err(LoadError::TimeIndexOutOfRange {
                    variable: variable.to_string(),
                    index,
                    count,
                });
            }
            let spatial = &self.dims[1..];
            let stride: usize = spatial.iter().map(|(_, n)| n).product();
            (spatial, index * stride)
        } else {
            if time_index.map_or(false, |i| i > 0) {
                return Err(LoadError::MissingTimeDimension(variable.to_string()));
            }
            (&self.dims[..], 0)
        };

        let shape = match spatial {
            [(_, rows), (_, cols)] => FieldShape::Grid {
                rows: *rows,
                cols: *cols,
            },
            [(_, n)] => FieldShape::Nodes(*n),
            other => {
                return Err(LoadError::ShapeMismatch {
                    variable: variable.to_string(),
                    message: format!("expected 1 or 2 spatial dimensions, found {}", other.len()),
                })
            }
        };

        let end = offset + shape.len();
        let values = self
            .values
            .get(offset..end)
            .ok_or_else(|| LoadError::ShapeMismatch {
                variable: variable.to_string(),
                message: format!("{} values, needed {}", self.values.len(), end),
            })?
            .to_vec();

        Field::new(variable, shape, values)
    }
}
