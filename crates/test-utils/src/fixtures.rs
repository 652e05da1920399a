//! Common test fixtures: regions, events and registry names.

use geo::MultiPolygon;
use psa_common::{BoundingBox, Event};

/// Common bounding boxes as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Global extent.
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// US Atlantic coast, where most surge runs live.
    pub const US_EAST_COAST: (f64, f64, f64, f64) = (-82.0, 24.0, -66.0, 45.0);

    /// Covers the unit-spaced fixture grids starting at the origin.
    pub const FIXTURE_GRID: (f64, f64, f64, f64) = (-1.0, -1.0, 10.0, 10.0);

    /// The lower-left half of the 4x4 quadrant grid's extent.
    pub const QUADRANT_LEFT_HALF: (f64, f64, f64, f64) = (-0.5, -0.5, 1.5, 3.5);
}

/// Reference timestamps used by time-series fixtures.
pub mod time {
    /// First fixture time step (2018-09-14T00:00:00Z).
    pub const FIRST_STEP: &str = "2018-09-14T00:00:00Z";

    /// Hourly steps following [`FIRST_STEP`].
    pub const HOURLY_STEPS: [&str; 3] = [
        "2018-09-14T00:00:00Z",
        "2018-09-14T01:00:00Z",
        "2018-09-14T02:00:00Z",
    ];
}

/// Registry names used throughout the tests.
pub mod variables {
    pub const WATER_LEVEL: &str = "water_level";
    pub const WATER_LEVEL_MAX: &str = "water_level_max";
    pub const WIND_SPEED: &str = "wind_speed";
    pub const WIND_DIRECTION: &str = "wind_direction";
    pub const UNKNOWN: &str = "rainfall_total";
}

/// A rectangular region as a one-polygon multipolygon.
pub fn region(extent: (f64, f64, f64, f64)) -> MultiPolygon<f64> {
    let (min_x, min_y, max_x, max_y) = extent;
    MultiPolygon::new(vec![BoundingBox::new(min_x, min_y, max_x, max_y).to_polygon()])
}

/// An event whose region covers every fixture grid.
pub fn test_event() -> Event {
    Event::new("florence-2018", "Florence", region(bbox::FIXTURE_GRID))
}

/// An event restricted to `extent`.
pub fn test_event_in(extent: (f64, f64, f64, f64)) -> Event {
    Event::new("florence-2018", "Florence", region(extent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_matches_extent() {
        let event = test_event_in(bbox::US_EAST_COAST);
        assert_eq!(
            event.region_bbox().unwrap(),
            BoundingBox::new(-82.0, 24.0, -66.0, 45.0)
        );
    }

    #[test]
    fn test_hourly_steps_start_at_first_step() {
        assert_eq!(time::HOURLY_STEPS[0], time::FIRST_STEP);
    }
}
