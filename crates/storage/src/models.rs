//! Stored record types.

use chrono::{DateTime, Utc};
use geo::{MultiPolygon, Point};
use psa_common::{BoundingBox, Color, ColorStop, GeoJsonGeometry, VariableSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::geohash::{self, GEOHASH_PRECISION};

/// A variable registered against an event.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRecord {
    pub id: Uuid,
    pub event_id: String,
    pub spec: &'static VariableSpec,
    pub color_bar: Vec<ColorStop>,
}

impl VariableRecord {
    pub fn new(event_id: impl Into<String>, spec: &'static VariableSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            spec,
            color_bar: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }
}

/// Geometry of a stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordGeometry {
    MultiPolygon(MultiPolygon<f64>),
    Point(Point<f64>),
}

impl RecordGeometry {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordGeometry::MultiPolygon(_) => "MultiPolygon",
            RecordGeometry::Point(_) => "Point",
        }
    }

    /// Coarse bbox kept next to polygon geometry; points have none.
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            RecordGeometry::MultiPolygon(mp) => BoundingBox::of(mp),
            RecordGeometry::Point(_) => None,
        }
    }

    pub fn to_geojson(&self) -> GeoJsonGeometry {
        match self {
            RecordGeometry::MultiPolygon(mp) => GeoJsonGeometry::from(mp),
            RecordGeometry::Point(p) => GeoJsonGeometry::from(p),
        }
    }

    pub fn from_geojson(geometry: &GeoJsonGeometry) -> StorageResult<Self> {
        Ok(match geometry {
            GeoJsonGeometry::Point { .. } => RecordGeometry::Point(geometry.to_point()?),
            _ => RecordGeometry::MultiPolygon(geometry.to_multi_polygon()?),
        })
    }

    /// EWKT with SRID 4326, as accepted by PostGIS text input.
    pub fn to_ewkt(&self) -> String {
        match self {
            RecordGeometry::Point(p) => format!("SRID=4326;POINT({} {})", p.x(), p.y()),
            RecordGeometry::MultiPolygon(mp) => {
                let polygons: Vec<String> = mp
                    .iter()
                    .map(|polygon| {
                        let rings: Vec<String> = std::iter::once(polygon.exterior())
                            .chain(polygon.interiors())
                            .map(|ring| {
                                let coords: Vec<String> = ring.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
                                format!("({})", coords.join(","))
                            })
                            .collect();
                        format!("({})", rings.join(","))
                    })
                    .collect();
                if polygons.is_empty() {
                    "SRID=4326;MULTIPOLYGON EMPTY".to_string()
                } else {
                    format!("SRID=4326;MULTIPOLYGON({})", polygons.join(","))
                }
            }
        }
    }
}

/// Identity of a polygon record within a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordKey {
    pub variable_id: Uuid,
    pub date: Option<DateTime<Utc>>,
    pub value: f64,
}

/// A record before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub variable_id: Uuid,
    pub date: Option<DateTime<Utc>>,
    pub geometry: RecordGeometry,
    pub value: f64,
    pub meta: Map<String, Value>,
    pub color: Option<Color>,
}

impl NewRecord {
    pub fn polygon(
        variable_id: Uuid,
        date: Option<DateTime<Utc>>,
        value: f64,
        geometry: MultiPolygon<f64>,
        color: Color,
    ) -> Self {
        Self {
            variable_id,
            date,
            geometry: RecordGeometry::MultiPolygon(geometry),
            value,
            meta: Map::new(),
            color: Some(color),
        }
    }

    pub fn point(
        variable_id: Uuid,
        date: Option<DateTime<Utc>>,
        lon: f64,
        lat: f64,
        value: f64,
        meta: Map<String, Value>,
    ) -> Self {
        Self {
            variable_id,
            date,
            geometry: RecordGeometry::Point(Point::new(lon, lat)),
            value,
            meta,
            color: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            variable_id: self.variable_id,
            date: self.date,
            value: self.value,
        }
    }

    /// Assign an id and derive the bbox and geohash.
    pub fn into_record(self) -> DataRecord {
        let bbox = self.geometry.bbox();
        let geo_hash = match &self.geometry {
            RecordGeometry::Point(p) => Some(geohash::encode(p.x(), p.y(), GEOHASH_PRECISION)),
            RecordGeometry::MultiPolygon(_) => None,
        };
        DataRecord {
            id: Uuid::new_v4(),
            variable_id: self.variable_id,
            date: self.date,
            geometry: self.geometry,
            bbox,
            geo_hash,
            value: self.value,
            meta: self.meta,
            color: self.color,
        }
    }
}

/// A stored polygon or point record.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub id: Uuid,
    pub variable_id: Uuid,
    pub date: Option<DateTime<Utc>>,
    pub geometry: RecordGeometry,
    pub bbox: Option<BoundingBox>,
    pub geo_hash: Option<String>,
    pub value: f64,
    pub meta: Map<String, Value>,
    pub color: Option<Color>,
}

impl DataRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            variable_id: self.variable_id,
            date: self.date,
            value: self.value,
        }
    }

    /// Bbox test, then exact intersection. Boundaries count as covered.
    pub fn covers(&self, lon: f64, lat: f64) -> bool {
        use geo::Intersects;

        let point = Point::new(lon, lat);
        match &self.geometry {
            RecordGeometry::MultiPolygon(mp) => {
                self.bbox.is_some_and(|bbox| bbox.contains_point(lon, lat)) && mp.intersects(&point)
            }
            RecordGeometry::Point(p) => *p == point,
        }
    }
}

/// The record shape handed to API consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub variable_name: String,
    pub units: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub geometry: GeoJsonGeometry,
    pub metadata: Map<String, Value>,
}

impl PersistedRecord {
    pub fn new(variable: &VariableRecord, record: &DataRecord) -> Self {
        Self {
            variable_name: variable.spec.name.to_string(),
            units: variable.spec.unit.as_str().to_string(),
            value: record.value,
            color: record.color,
            date: record.date,
            geometry: record.geometry.to_geojson(),
            metadata: record.meta.clone(),
        }
    }
}

/// One row of the ingest log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestLogEntry {
    pub event_id: String,
    pub dataset_path: String,
    pub success: bool,
    pub exception: Option<String>,
    pub date: DateTime<Utc>,
}

impl IngestLogEntry {
    pub fn success(event_id: impl Into<String>, dataset_path: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            dataset_path: dataset_path.into(),
            success: true,
            exception: None,
            date: Utc::now(),
        }
    }

    pub fn failure(event_id: impl Into<String>, dataset_path: impl Into<String>, exception: impl Into<String>) -> Self {
        Self {
            success: false,
            exception: Some(exception.into()),
            ..Self::success(event_id, dataset_path)
        }
    }
}
