//! Ingestion configuration.
//!
//! Defaults can be overridden from a job file (serde) or from the
//! environment with [`IngestConfig::from_env`].

use contour::{ContourLevels, ContourResult, GridSampling, DEFAULT_LEVEL_COUNT};
use serde::{Deserialize, Serialize};
use storage::DEFAULT_POINT_BATCH_SIZE;

use crate::error::{IngestionError, Result};

/// Default minimum polygon area in square meters.
pub const DEFAULT_MIN_POLYGON_AREA_M2: f64 = 1.0;

/// How contour levels are chosen for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    /// Evenly spaced from the field's minimum to its maximum.
    Count(usize),
    /// Fixed iso-values for every field.
    Explicit(Vec<f64>),
}

impl Default for LevelSpec {
    fn default() -> Self {
        LevelSpec::Count(DEFAULT_LEVEL_COUNT)
    }
}

impl LevelSpec {
    /// Parse `"25"` as a count or `"0,0.5,1"` as explicit levels.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(count) = text.parse::<usize>() {
            return Ok(LevelSpec::Count(count));
        }
        text.split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(LevelSpec::Explicit)
            .map_err(|e| IngestionError::InvalidConfig(format!("contour levels '{}': {}", text, e)))
    }

    /// Levels for a field with the given `(min, max)` domain.
    pub fn levels_for(&self, domain: Option<(f64, f64)>) -> ContourResult<ContourLevels> {
        match self {
            LevelSpec::Count(count) => Ok(ContourLevels::evenly_spaced(domain, *count)),
            LevelSpec::Explicit(values) => ContourLevels::explicit(values.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub levels: LevelSpec,
    /// Exteriors with a smaller geodesic area are dropped.
    pub min_polygon_area_m2: f64,
    /// Unknown variables fail the ingestion instead of being skipped.
    pub strict_variables: bool,
    pub grid_sampling: GridSampling,
    pub point_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            levels: LevelSpec::default(),
            min_polygon_area_m2: DEFAULT_MIN_POLYGON_AREA_M2,
            strict_variables: true,
            grid_sampling: GridSampling::default(),
            point_batch_size: DEFAULT_POINT_BATCH_SIZE,
        }
    }
}

impl IngestConfig {
    /// Apply `PSA_*` environment overrides on top of `self`.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(levels) = var("PSA_CONTOUR_LEVELS") {
            self.levels = LevelSpec::parse(&levels)?;
        }
        if let Some(area) = var("PSA_MIN_POLYGON_AREA") {
            self.min_polygon_area_m2 = area
                .trim()
                .parse()
                .map_err(|e| IngestionError::InvalidConfig(format!("PSA_MIN_POLYGON_AREA '{}': {}", area, e)))?;
        }
        if let Some(strict) = var("PSA_STRICT_VARIABLES") {
            self.strict_variables = parse_bool(&strict)
                .ok_or_else(|| IngestionError::InvalidConfig(format!("PSA_STRICT_VARIABLES '{}'", strict)))?;
        }
        if let Some(sampling) = var("PSA_GRID_SAMPLING") {
            self.grid_sampling = sampling.parse().map_err(IngestionError::InvalidConfig)?;
        }
        if let Some(size) = var("PSA_POINT_BATCH_SIZE") {
            self.point_batch_size = size
                .trim()
                .parse()
                .map_err(|e| IngestionError::InvalidConfig(format!("PSA_POINT_BATCH_SIZE '{}': {}", size, e)))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if let LevelSpec::Count(0) = self.levels {
            return Err(IngestionError::InvalidConfig("level count must be at least 1".to_string()));
        }
        if let LevelSpec::Explicit(values) = &self.levels {
            ContourLevels::explicit(values.clone())
                .map_err(|e| IngestionError::InvalidConfig(e.to_string()))?;
        }
        if self.min_polygon_area_m2.is_nan() || self.min_polygon_area_m2 < 0.0 {
            return Err(IngestionError::InvalidConfig(format!(
                "minimum polygon area {} must be non-negative",
                self.min_polygon_area_m2
            )));
        }
        if self.point_batch_size == 0 {
            return Err(IngestionError::InvalidConfig("point batch size must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
