//! Ring classification and polygon assembly.
//!
//! Turns the rings of one band into a single valid `MultiPolygon`:
//!
//! 1. rings with non-negative shoelace area are exteriors, the rest holes
//! 2. each exterior claims the holes it contains, largest first, skipping
//!    holes that sit inside a hole it already claimed
//! 3. exteriors below the minimum geodesic area are dropped
//! 4. invalid output is repaired by dissolving polygons into each other;
//!    polygons that stay invalid are dropped
//! 5. the result is clipped to the event region

use geo::{BooleanOps, Contains, Coord, GeodesicArea, LineString, MultiPolygon, Polygon, Validation};
use psa_common::BoundingBox;
use tracing::{debug, warn};

use crate::bands::{FilledBand, Ring};
use crate::error::ContourError;

/// Default minimum exterior area in square meters.
pub const MIN_POLYGON_AREA_M2: f64 = 1.0;

/// Decimal places coordinates are rounded to before measuring area.
pub const AREA_PRECISION: u32 = 4;

#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions<'a> {
    pub region: Option<&'a MultiPolygon<f64>>,
    pub min_area_m2: f64,
    pub area_precision: u32,
}

impl Default for AssemblyOptions<'_> {
    fn default() -> Self {
        Self {
            region: None,
            min_area_m2: MIN_POLYGON_AREA_M2,
            area_precision: AREA_PRECISION,
        }
    }
}

/// Final geometry for one contour level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGeometry {
    pub index: usize,
    pub level: f64,
    pub geometry: MultiPolygon<f64>,
}

/// Shoelace signed area; positive for counter-clockwise rings.
pub fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    (0..n)
        .map(|i| {
            let (p, q) = (ring[i], ring[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

/// Split rings into `(exteriors, interiors)` by winding.
pub fn classify(rings: Vec<Ring>) -> (Vec<Ring>, Vec<Ring>) {
    rings.into_iter().partition(|ring| signed_area(ring) >= 0.0)
}

/// Geodesic (WGS84) area of a ring in square meters, after rounding its
/// coordinates to `precision` decimals.
pub fn geodesic_area(ring: &[Coord<f64>], precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    let rounded: Vec<Coord<f64>> = ring
        .iter()
        .map(|c| Coord {
            x: (c.x * scale).round() / scale,
            y: (c.y * scale).round() / scale,
        })
        .collect();
    Polygon::new(LineString::from(rounded), vec![]).geodesic_area_unsigned()
}

struct Interior {
    ring: LineString<f64>,
    bbox: Option<BoundingBox>,
    probe: Coord<f64>,
    area: f64,
}

/// A point strictly on the ring, used for containment tests. Rings from one
/// band never cross, so one probe decides whether a ring lies inside another.
fn probe(ring: &[Coord<f64>]) -> Coord<f64> {
    let (a, b) = (ring[0], ring[1 % ring.len()]);
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

/// Attach holes to exteriors and drop exteriors below the area threshold.
pub fn assign_holes(exteriors: Vec<Ring>, interiors: Vec<Ring>, min_area_m2: f64, precision: u32) -> Vec<Polygon<f64>> {
    let mut interiors: Vec<Option<Interior>> = interiors
        .into_iter()
        .filter(|ring| ring.len() >= 3)
        .map(|ring| {
            let line = LineString::from(ring.clone());
            Some(Interior {
                bbox: BoundingBox::of(&line),
                probe: probe(&ring),
                area: signed_area(&ring).abs(),
                ring: line,
            })
        })
        .collect();
    interiors.sort_by(|a, b| {
        let area = |i: &Option<Interior>| i.as_ref().map_or(0.0, |i| i.area);
        area(b).total_cmp(&area(a))
    });

    let mut polygons = Vec::with_capacity(exteriors.len());
    for exterior in exteriors {
        // Small exteriors are skipped before claiming, leaving their holes
        // to the other exteriors.
        let area = geodesic_area(&exterior, precision);
        if area < min_area_m2 {
            debug!(area_m2 = area, min_area_m2, "Dropping small contour polygon");
            continue;
        }

        let shell = Polygon::new(LineString::from(exterior.clone()), vec![]);
        let shell_bbox = BoundingBox::of(&shell);
        let mut holes: Vec<Polygon<f64>> = Vec::new();

        for slot in interiors.iter_mut() {
            let Some(interior) = slot.as_ref() else { continue };
            let nested = match (&shell_bbox, &interior.bbox) {
                (Some(outer), Some(inner)) => outer.contains(inner),
                _ => false,
            };
            if !nested || !shell.contains(&interior.probe) {
                continue;
            }
            if holes.iter().any(|hole| hole.contains(&interior.probe)) {
                continue;
            }
            if let Some(claimed) = slot.take() {
                holes.push(Polygon::new(claimed.ring, vec![]));
            }
        }

        let holes = holes.into_iter().map(|h| h.into_inner().0).collect();
        polygons.push(Polygon::new(LineString::from(exterior), holes));
    }

    let unclaimed = interiors.iter().filter(|i| i.is_some()).count();
    if unclaimed > 0 {
        debug!(unclaimed, "Interior rings left without an exterior");
    }
    polygons
}

/// Dissolve polygons into one another, one at a time.
///
/// Each polygon is unioned in as its own operand, so area two polygons share
/// is kept once rather than cancelled, and a self-intersecting ring resolves
/// to its simple parts.
pub fn dissolve(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    polygons
        .into_iter()
        .fold(MultiPolygon::new(vec![]), |acc, polygon| {
            acc.union(&MultiPolygon::new(vec![polygon]))
        })
}

/// Repair an invalid multipolygon by dissolving it, then drop any polygon
/// that is still invalid.
pub fn repair(geometry: MultiPolygon<f64>, level: f64) -> MultiPolygon<f64> {
    let geometry = if geometry.is_valid() {
        geometry
    } else {
        debug!(level, "Repairing invalid contour geometry");
        dissolve(geometry.0)
    };

    MultiPolygon::new(
        geometry
            .into_iter()
            .filter(|polygon| {
                if polygon.is_valid() {
                    return true;
                }
                let error = ContourError::InvalidGeometry {
                    level,
                    message: format!(
                        "polygon with {} exterior vertices still invalid after repair",
                        polygon.exterior().0.len()
                    ),
                };
                warn!(error = %error, "Dropping invalid contour polygon");
                false
            })
            .collect(),
    )
}

/// Assemble one band into its level geometry. `None` when nothing survives.
pub fn assemble_band(band: &FilledBand, options: &AssemblyOptions<'_>) -> Option<LevelGeometry> {
    let (exteriors, interiors) = classify(band.rings.clone());
    let polygons = assign_holes(exteriors, interiors, options.min_area_m2, options.area_precision);
    if polygons.is_empty() {
        return None;
    }

    let mut geometry = repair(MultiPolygon::new(polygons), band.level);
    if let Some(region) = options.region {
        geometry = geometry.intersection(region);
    }

    if geometry.0.is_empty() {
        return None;
    }
    Some(LevelGeometry {
        index: band.index,
        level: band.level,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64, ccw: bool) -> Ring {
        let mut ring = vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
        ];
        if !ccw {
            ring.reverse();
        }
        ring
    }

    #[test]
    fn test_classify_by_winding() {
        let (ext, int) = classify(vec![square(0.0, 0.0, 1.0, true), square(0.2, 0.2, 0.5, false)]);
        assert_eq!(ext.len(), 1);
        assert_eq!(int.len(), 1);
        assert_eq!(signed_area(&ext[0]), 1.0);
    }

    #[test]
    fn test_zero_area_ring_is_exterior() {
        let line = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
        ];
        let (ext, _) = classify(vec![line]);
        assert_eq!(ext.len(), 1);
    }

    #[test]
    fn test_geodesic_area_one_degree_at_equator() {
        let area = geodesic_area(&square(0.0, 0.0, 1.0, true), AREA_PRECISION);
        // Roughly 111 km x 110 km.
        assert!(area > 1.2e10 && area < 1.25e10, "area = {}", area);
    }

    #[test]
    fn test_dissolve_keeps_shared_area_once() {
        let polygons = [square(0.0, 0.0, 2.0, true), square(1.0, 0.0, 2.0, true), square(2.0, 0.0, 2.0, true)]
            .into_iter()
            .map(|ring| Polygon::new(LineString::from(ring), vec![]))
            .collect();
        let dissolved = dissolve(polygons);
        assert_eq!(dissolved.0.len(), 1);
        assert!((geo::Area::unsigned_area(&dissolved) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_hole_outside_exterior_not_claimed() {
        let polygons = assign_holes(
            vec![square(0.0, 0.0, 1.0, true)],
            vec![square(5.0, 5.0, 1.0, false)],
            MIN_POLYGON_AREA_M2,
            AREA_PRECISION,
        );
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].interiors().is_empty());
    }
}
