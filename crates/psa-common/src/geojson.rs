//! GeoJSON geometry codec.
//!
//! Only the geometry types the pipeline stores are supported: `Point`,
//! `Polygon` and `MultiPolygon`. Polygons always decode to a
//! `MultiPolygon` so callers deal with a single polygonal type.

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("Expected {expected} geometry, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
}

type Ring = Vec<[f64; 2]>;

/// A GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

impl GeoJsonGeometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            GeoJsonGeometry::Point { .. } => "Point",
            GeoJsonGeometry::Polygon { .. } => "Polygon",
            GeoJsonGeometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    pub fn parse(json: &str) -> Result<Self, GeoJsonError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, GeoJsonError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a `Polygon` or `MultiPolygon`.
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>, GeoJsonError> {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => {
                Ok(MultiPolygon::new(vec![polygon_from_rings(coordinates)]))
            }
            GeoJsonGeometry::MultiPolygon { coordinates } => Ok(MultiPolygon::new(
                coordinates.iter().map(|p| polygon_from_rings(p)).collect(),
            )),
            other => Err(GeoJsonError::UnexpectedType {
                expected: "polygonal",
                found: other.type_name(),
            }),
        }
    }

    pub fn to_point(&self) -> Result<Point<f64>, GeoJsonError> {
        match self {
            GeoJsonGeometry::Point { coordinates } => Ok(Point::new(coordinates[0], coordinates[1])),
            other => Err(GeoJsonError::UnexpectedType {
                expected: "Point",
                found: other.type_name(),
            }),
        }
    }
}

fn ring_to_json(ring: &LineString<f64>) -> Ring {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn polygon_to_json(polygon: &Polygon<f64>) -> Vec<Ring> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_to_json)
        .collect()
}

fn polygon_from_rings(rings: &[Ring]) -> Polygon<f64> {
    let mut rings = rings
        .iter()
        .map(|ring| LineString::from(ring.iter().map(|&[x, y]| Coord { x, y }).collect::<Vec<_>>()));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Polygon::new(exterior, rings.collect())
}

impl From<&Point<f64>> for GeoJsonGeometry {
    fn from(point: &Point<f64>) -> Self {
        GeoJsonGeometry::Point {
            coordinates: [point.x(), point.y()],
        }
    }
}

impl From<&Polygon<f64>> for GeoJsonGeometry {
    fn from(polygon: &Polygon<f64>) -> Self {
        GeoJsonGeometry::Polygon {
            coordinates: polygon_to_json(polygon),
        }
    }
}

impl From<&MultiPolygon<f64>> for GeoJsonGeometry {
    fn from(mp: &MultiPolygon<f64>) -> Self {
        GeoJsonGeometry::MultiPolygon {
            coordinates: mp.iter().map(polygon_to_json).collect(),
        }
    }
}

/// `#[serde(with = "...")]` adapter storing a `MultiPolygon` as GeoJSON.
/// Accepts either `Polygon` or `MultiPolygon` on input.
pub mod multi_polygon {
    use super::GeoJsonGeometry;
    use geo::MultiPolygon;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(mp: &MultiPolygon<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        GeoJsonGeometry::from(mp).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MultiPolygon<f64>, D::Error> {
        GeoJsonGeometry::deserialize(deserializer)?
            .to_multi_polygon()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_polygon_decodes_to_multi_polygon() {
        let json = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#;
        let mp = GeoJsonGeometry::parse(json).unwrap().to_multi_polygon().unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_multi_polygon_with_hole() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 1.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 1.0)]],
        );
        let mp = MultiPolygon::new(vec![poly]);
        let geometry = GeoJsonGeometry::from(&mp);
        let json = geometry.to_json_string().unwrap();
        assert!(json.starts_with(r#"{"type":"MultiPolygon""#));

        let back = GeoJsonGeometry::parse(&json).unwrap().to_multi_polygon().unwrap();
        assert_eq!(back, mp);
    }

    #[test]
    fn test_type_mismatch() {
        let point = GeoJsonGeometry::from(&Point::new(1.0, 2.0));
        assert!(matches!(
            point.to_multi_polygon(),
            Err(GeoJsonError::UnexpectedType { found: "Point", .. })
        ));
        assert_eq!(point.to_point().unwrap(), Point::new(1.0, 2.0));
    }
}
