//! Colors and legend stops.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An opaque RGB color, serialized as a 7-character `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from unit-interval channels, rounding to the nearest byte.
    pub fn from_unit(r: f64, g: f64, b: f64) -> Self {
        let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(to_byte(r), to_byte(g), to_byte(b))
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hex color: {0:?}")]
pub struct ColorParseError(pub String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| ColorParseError(s.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError(s.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One legend entry: a data value and its color.
///
/// Serialized as a `[value, "#rrggbb"]` pair so stored color bars stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, Color)", into = "(f64, Color)")]
pub struct ColorStop {
    pub value: f64,
    pub color: Color,
}

impl ColorStop {
    pub fn new(value: f64, color: Color) -> Self {
        Self { value, color }
    }
}

impl From<(f64, Color)> for ColorStop {
    fn from((value, color): (f64, Color)) -> Self {
        Self { value, color }
    }
}

impl From<ColorStop> for (f64, Color) {
    fn from(stop: ColorStop) -> Self {
        (stop.value, stop.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = Color::rgb(0, 128, 255);
        assert_eq!(color.to_hex(), "#0080ff");
        assert_eq!("#0080ff".parse::<Color>().unwrap(), color);
        assert_eq!("#0080FF".parse::<Color>().unwrap(), color);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("0080ff".parse::<Color>().is_err());
        assert!("#0080f".parse::<Color>().is_err());
        assert!("#zz80ff".parse::<Color>().is_err());
    }

    #[test]
    fn test_from_unit_clamps() {
        assert_eq!(Color::from_unit(1.5, -0.2, 0.5), Color::rgb(255, 0, 128));
    }

    #[test]
    fn test_color_stop_serializes_as_pair() {
        let stop = ColorStop::new(2.5, Color::rgb(255, 0, 0));
        let json = serde_json::to_string(&stop).unwrap();
        assert_eq!(json, r##"[2.5,"#ff0000"]"##);

        let back: ColorStop = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stop);
    }
}
