//! Static registry of the hazard variables the pipeline knows how to ingest.
//!
//! Each entry fixes how a variable is represented once stored: as contour
//! polygons or as point features, as a single snapshot or as a time series,
//! and in which unit. Names not found here are rejected by [`resolve`].

use crate::error::RegistryError;

/// Geometry produced for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoKind {
    /// Filled contour bands.
    Polygon,
    /// One feature per grid node, carrying a companion variable in its metadata.
    Point { companion: &'static str },
}

impl GeoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoKind::Polygon => "polygon",
            GeoKind::Point { .. } => "point",
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, GeoKind::Polygon)
    }
}

/// Whether a variable is stored once or once per timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// Maximum-envelope style fields; stored without a timestamp.
    Snapshot,
    /// Stored once per time step.
    TimeSeries,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Snapshot => "snapshot",
            TemporalKind::TimeSeries => "time-series",
        }
    }
}

/// Display unit of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Meters,
    MetersPerSecond,
    Degrees,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Meters => "m",
            Unit::MetersPerSecond => "m/s",
            Unit::Degrees => "degrees",
        }
    }
}

/// Registry entry for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: &'static str,
    pub display_name: &'static str,
    pub geo_kind: GeoKind,
    pub temporal_kind: TemporalKind,
    pub unit: Unit,
    /// Shown by default in map viewers.
    pub auto_displayed: bool,
}

impl VariableSpec {
    pub fn is_snapshot(&self) -> bool {
        self.temporal_kind == TemporalKind::Snapshot
    }
}

pub const VARIABLE_WATER_LEVEL: &str = "water_level";
pub const VARIABLE_WATER_LEVEL_MAX: &str = "water_level_max";
pub const VARIABLE_WAVE_HEIGHT: &str = "wave_height";
pub const VARIABLE_WAVE_HEIGHT_MAX: &str = "wave_height_max";
pub const VARIABLE_WIND_SPEED: &str = "wind_speed";
pub const VARIABLE_WIND_SPEED_MAX: &str = "wind_speed_max";
pub const VARIABLE_WIND_DIRECTION: &str = "wind_direction";

/// All known variables.
pub static VARIABLES: &[VariableSpec] = &[
    VariableSpec {
        name: VARIABLE_WATER_LEVEL,
        display_name: "Water Level",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::TimeSeries,
        unit: Unit::Meters,
        auto_displayed: false,
    },
    VariableSpec {
        name: VARIABLE_WATER_LEVEL_MAX,
        display_name: "Water Level Maximum",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::Snapshot,
        unit: Unit::Meters,
        auto_displayed: true,
    },
    VariableSpec {
        name: VARIABLE_WAVE_HEIGHT,
        display_name: "Wave Height",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::TimeSeries,
        unit: Unit::Meters,
        auto_displayed: false,
    },
    VariableSpec {
        name: VARIABLE_WAVE_HEIGHT_MAX,
        display_name: "Wave Height Maximum",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::Snapshot,
        unit: Unit::Meters,
        auto_displayed: false,
    },
    VariableSpec {
        name: VARIABLE_WIND_SPEED,
        display_name: "Wind Speed",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::TimeSeries,
        unit: Unit::MetersPerSecond,
        auto_displayed: false,
    },
    VariableSpec {
        name: VARIABLE_WIND_SPEED_MAX,
        display_name: "Wind Speed Maximum",
        geo_kind: GeoKind::Polygon,
        temporal_kind: TemporalKind::Snapshot,
        unit: Unit::MetersPerSecond,
        auto_displayed: false,
    },
    VariableSpec {
        name: VARIABLE_WIND_DIRECTION,
        display_name: "Wind Direction",
        geo_kind: GeoKind::Point {
            companion: VARIABLE_WIND_SPEED,
        },
        temporal_kind: TemporalKind::TimeSeries,
        unit: Unit::Degrees,
        auto_displayed: false,
    },
];

/// Look up a variable by its dataset name.
pub fn resolve(name: &str) -> Result<&'static VariableSpec, RegistryError> {
    VARIABLES
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| RegistryError::UnknownVariable(name.to_string()))
}

pub fn is_known(name: &str) -> bool {
    resolve(name).is_ok()
}
