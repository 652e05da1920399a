//! Contour level selection.
//!
//! Level `i` owns the half-open band `[levels[i], levels[i + 1])`; the last
//! level owns everything at or above it. A band's record value is its lower
//! level.

use crate::error::{ContourError, ContourResult};

/// Default number of evenly spaced levels.
pub const DEFAULT_LEVEL_COUNT: usize = 25;

/// Value written into null mesh nodes before contouring.
pub const NULL_FILL_VALUE: f64 = -9999.0;

/// Domain floor used when a field has no valid values.
pub const MASKED_DOMAIN_FLOOR: f64 = 0.0;

/// Strictly increasing, non-empty list of iso-values.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLevels {
    values: Vec<f64>,
}

impl ContourLevels {
    /// `count` evenly spaced levels from `min` to `max` inclusive.
    ///
    /// A fully masked field (`None`) collapses to the floor value and a flat
    /// field to a single level, so callers never divide by a zero range.
    pub fn evenly_spaced(domain: Option<(f64, f64)>, count: usize) -> Self {
        let (min, max) = domain.unwrap_or((MASKED_DOMAIN_FLOOR, MASKED_DOMAIN_FLOOR));
        if count <= 1 || max <= min {
            return Self { values: vec![min] };
        }

        let step = (max - min) / (count - 1) as f64;
        let values = (0..count)
            .map(|i| if i == count - 1 { max } else { min + step * i as f64 })
            .collect();
        Self { values }
    }

    /// Caller-supplied levels. Sorted and de-duplicated; must be finite.
    pub fn explicit(mut levels: Vec<f64>) -> ContourResult<Self> {
        if levels.is_empty() {
            return Err(ContourError::InvalidLevels("no levels given".to_string()));
        }
        if let Some(bad) = levels.iter().find(|v| !v.is_finite()) {
            return Err(ContourError::InvalidLevels(format!("non-finite level {}", bad)));
        }
        levels.sort_by(|a, b| a.total_cmp(b));
        levels.dedup();
        Ok(Self { values: levels })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lower and upper bound of band `index`. The last band is unbounded above.
    pub fn band_bounds(&self, index: usize) -> (f64, f64) {
        let lower = self.values[index];
        let upper = self.values.get(index + 1).copied().unwrap_or(f64::INFINITY);
        (lower, upper)
    }

    /// Band containing `value`; `None` below the first level or for NaN.
    pub fn band_of(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.values[0] {
            return None;
        }
        Some(self.values.partition_point(|&level| level <= value) - 1)
    }

    /// A fill value guaranteed to sit below every band.
    pub fn sentinel(&self) -> f64 {
        let first = self.values[0];
        if NULL_FILL_VALUE < first {
            NULL_FILL_VALUE
        } else {
            first - 1.0 - first.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evenly_spaced_endpoints() {
        let levels = ContourLevels::evenly_spaced(Some((0.0, 3.0)), 4);
        assert_eq!(levels.values(), &[0.0, 1.0, 2.0, 3.0]);

        let levels = ContourLevels::evenly_spaced(Some((-1.3, 7.9)), DEFAULT_LEVEL_COUNT);
        assert_eq!(levels.len(), 25);
        assert_eq!(levels.values()[0], -1.3);
        assert_eq!(levels.values()[24], 7.9);
    }

    #[test]
    fn test_flat_field_single_level() {
        let levels = ContourLevels::evenly_spaced(Some((4.2, 4.2)), 25);
        assert_eq!(levels.values(), &[4.2]);
        assert_eq!(levels.band_bounds(0), (4.2, f64::INFINITY));
    }

    #[test]
    fn test_fully_masked_uses_floor() {
        let levels = ContourLevels::evenly_spaced(None, 25);
        assert_eq!(levels.values(), &[MASKED_DOMAIN_FLOOR]);
    }

    #[test]
    fn test_band_of_half_open() {
        let levels = ContourLevels::evenly_spaced(Some((0.0, 3.0)), 4);
        assert_eq!(levels.band_of(-0.1), None);
        assert_eq!(levels.band_of(0.0), Some(0));
        assert_eq!(levels.band_of(0.99), Some(0));
        assert_eq!(levels.band_of(1.0), Some(1));
        assert_eq!(levels.band_of(3.0), Some(3));
        assert_eq!(levels.band_of(100.0), Some(3));
        assert_eq!(levels.band_of(f64::NAN), None);
    }

    #[test]
    fn test_explicit_sorted_and_validated() {
        let levels = ContourLevels::explicit(vec![2.0, 0.5, 2.0, 1.0]).unwrap();
        assert_eq!(levels.values(), &[0.5, 1.0, 2.0]);
        assert!(ContourLevels::explicit(vec![]).is_err());
        assert!(ContourLevels::explicit(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_sentinel_below_first_level() {
        let levels = ContourLevels::evenly_spaced(Some((0.0, 1.0)), 2);
        assert_eq!(levels.sentinel(), NULL_FILL_VALUE);

        let deep = ContourLevels::explicit(vec![-20000.0, 0.0]).unwrap();
        assert!(deep.sentinel() < -20000.0);
    }
}
