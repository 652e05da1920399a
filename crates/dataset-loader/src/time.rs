//! CF-convention time decoding (`"<unit> since <reference>"`).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{LoadError, LoadResult};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parsed `units` attribute of a time variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    /// Milliseconds per unit step.
    pub step_ms: f64,
    pub reference: DateTime<Utc>,
}

impl TimeUnits {
    pub fn parse(units: &str) -> LoadResult<Self> {
        let invalid = || LoadError::InvalidTime(units.to_string());
        let (unit, reference) = units.split_once(" since ").ok_or_else(invalid)?;

        let step_ms = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1_000.0,
            "minutes" | "minute" | "mins" | "min" => 60_000.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600_000.0,
            "days" | "day" | "d" => 86_400_000.0,
            _ => return Err(invalid()),
        };

        Ok(Self {
            step_ms,
            reference: parse_reference(reference).ok_or_else(invalid)?,
        })
    }

    pub fn decode(&self, value: f64) -> LoadResult<DateTime<Utc>> {
        if !value.is_finite() {
            return Err(LoadError::InvalidTime(format!("non-finite time value {}", value)));
        }
        Ok(self.reference + Duration::milliseconds((value * self.step_ms).round() as i64))
    }
}

fn parse_reference(text: &str) -> Option<DateTime<Utc>> {
    let text = text
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Decode raw time values using a CF `units` string.
pub fn decode_times(values: &[f64], units: &str) -> LoadResult<Vec<DateTime<Utc>>> {
    let units = TimeUnits::parse(units)?;
    values.iter().map(|&v| units.decode(v)).collect()
}
