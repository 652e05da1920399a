//! The hazard event a set of datasets belongs to.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// A named hazard event (e.g. a storm) with its area of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    /// Area of interest in WGS84 lon/lat. Stored geometry is clipped to it.
    #[serde(with = "crate::geojson::multi_polygon")]
    pub region: MultiPolygon<f64>,
}

impl Event {
    pub fn new(id: impl Into<String>, name: impl Into<String>, region: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region,
        }
    }

    pub fn region_bbox(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.region)
    }
}
