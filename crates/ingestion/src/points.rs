//! Point features from a pair of co-indexed fields.
//!
//! Each node where both the primary value and its companion are present
//! becomes one [`PointSample`]. The primary value is the record value and
//! both scalars go into the metadata, keyed by variable name.

use dataset_loader::{LoadError, LoadResult};
use geo::{Contains, MultiPolygon, Point};
use psa_common::BoundingBox;
use serde_json::{Map, Value};
use storage::PointSample;

/// Where each field value sits.
#[derive(Debug, Clone, Copy)]
pub enum NodeLocations<'a> {
    /// Row-major `[y, x]` grid over 1-D axes.
    Grid { x: &'a [f64], y: &'a [f64] },
    /// One coordinate pair per mesh node.
    Nodes { x: &'a [f64], y: &'a [f64] },
}

impl NodeLocations<'_> {
    pub fn len(&self) -> usize {
        match self {
            NodeLocations::Grid { x, y } => x.len() * y.len(),
            NodeLocations::Nodes { x, .. } => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(lon, lat)` of value `index`.
    pub fn location(&self, index: usize) -> (f64, f64) {
        match self {
            NodeLocations::Grid { x, y } => (x[index % x.len()], y[index / x.len()]),
            NodeLocations::Nodes { x, y } => (x[index], y[index]),
        }
    }
}

/// A field and the registry name its values are stored under.
#[derive(Debug, Clone, Copy)]
pub struct NamedValues<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

/// Build point samples for every node where both fields have data and the
/// node lies inside `region`.
pub fn build_points(
    primary: NamedValues<'_>,
    companion: NamedValues<'_>,
    locations: NodeLocations<'_>,
    region: &MultiPolygon<f64>,
) -> LoadResult<Vec<PointSample>> {
    if let NodeLocations::Nodes { x, y } = locations {
        if x.len() != y.len() {
            return Err(LoadError::ShapeMismatch {
                variable: primary.name.to_string(),
                message: format!("{} x coordinates but {} y coordinates", x.len(), y.len()),
            });
        }
    }
    for field in [primary, companion] {
        if field.values.len() != locations.len() {
            return Err(LoadError::ShapeMismatch {
                variable: field.name.to_string(),
                message: format!("{} values for {} locations", field.values.len(), locations.len()),
            });
        }
    }

    let bounds = BoundingBox::of(region);
    let samples = primary
        .values
        .iter()
        .zip(companion.values)
        .enumerate()
        .filter(|(_, (value, other))| !value.is_nan() && !other.is_nan())
        .filter_map(|(index, (&value, &other))| {
            let (lon, lat) = locations.location(index);
            let inside = bounds.is_some_and(|b| b.contains_point(lon, lat)) && region.contains(&Point::new(lon, lat));
            if !inside {
                return None;
            }
            let mut meta = Map::new();
            meta.insert(primary.name.to_string(), Value::from(value));
            meta.insert(companion.name.to_string(), Value::from(other));
            Some(PointSample { lon, lat, value, meta })
        })
        .collect();
    Ok(samples)
}
