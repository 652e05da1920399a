//! Value-to-color mapping with the `jet` ramp.
//!
//! The ramp is sampled into a 256-entry lookup table exactly the way
//! matplotlib builds its `jet` colormap, so colors match the legends
//! produced by matplotlib-based tooling. Everything here is a pure function
//! of its inputs.

use std::sync::OnceLock;

use psa_common::{Color, ColorStop};

/// Number of legend entries.
pub const COLOR_STEPS: usize = 10;

const LUT_SIZE: usize = 256;

/// `(x, y_left, y_right)` anchor points per channel.
type Segments = &'static [(f64, f64, f64)];

const JET_RED: Segments = &[
    (0.0, 0.0, 0.0),
    (0.35, 0.0, 0.0),
    (0.66, 1.0, 1.0),
    (0.89, 1.0, 1.0),
    (1.0, 0.5, 0.5),
];

const JET_GREEN: Segments = &[
    (0.0, 0.0, 0.0),
    (0.125, 0.0, 0.0),
    (0.375, 1.0, 1.0),
    (0.64, 1.0, 1.0),
    (0.91, 0.0, 0.0),
    (1.0, 0.0, 0.0),
];

const JET_BLUE: Segments = &[
    (0.0, 0.5, 0.5),
    (0.11, 1.0, 1.0),
    (0.34, 1.0, 1.0),
    (0.65, 0.0, 0.0),
    (1.0, 0.0, 0.0),
];

fn channel(segments: Segments, x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    for pair in segments.windows(2) {
        let ((x0, _, y0), (x1, y1, _)) = (pair[0], pair[1]);
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
        }
    }
    segments.last().map_or(0.0, |&(_, y, _)| y)
}

fn jet_lut() -> &'static [Color; LUT_SIZE] {
    static LUT: OnceLock<[Color; LUT_SIZE]> = OnceLock::new();
    LUT.get_or_init(|| {
        std::array::from_fn(|i| {
            let x = i as f64 / (LUT_SIZE - 1) as f64;
            Color::from_unit(channel(JET_RED, x), channel(JET_GREEN, x), channel(JET_BLUE, x))
        })
    })
}

/// Color of a normalized value in `[0, 1]`; out-of-range values clamp.
pub fn jet(normalized: f64) -> Color {
    let index = if normalized.is_nan() || normalized <= 0.0 {
        0
    } else {
        ((normalized * LUT_SIZE as f64) as usize).min(LUT_SIZE - 1)
    };
    jet_lut()[index]
}

/// The value range colors are spread over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorDomain {
    pub min: f64,
    pub max: f64,
}

impl ColorDomain {
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Domain of a field range; fully masked fields collapse to `0.0`.
    pub fn from_range(range: Option<(f64, f64)>) -> Self {
        let (min, max) = range.unwrap_or((0.0, 0.0));
        Self::new(min, max)
    }

    pub fn is_flat(&self) -> bool {
        self.max <= self.min
    }

    /// Position of `value` in the domain; 0 for flat domains.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }
}

/// Color for a feature value.
pub fn color_for(value: f64, domain: ColorDomain) -> Color {
    jet(domain.normalize(value))
}

/// Legend with [`COLOR_STEPS`] entries.
pub fn legend(domain: ColorDomain) -> Vec<ColorStop> {
    legend_with_steps(domain, COLOR_STEPS)
}

/// Evenly spaced legend entries across the domain. When the domain spans at
/// least `steps` units, entry values are rounded up to whole numbers.
pub fn legend_with_steps(domain: ColorDomain, steps: usize) -> Vec<ColorStop> {
    if steps == 0 {
        return Vec::new();
    }
    let round_up = domain.max - domain.min >= steps as f64;
    let step = if steps > 1 {
        (domain.max - domain.min) / (steps - 1) as f64
    } else {
        0.0
    };

    (0..steps)
        .map(|i| {
            let raw = if i + 1 == steps && steps > 1 {
                domain.max
            } else {
                domain.min + step * i as f64
            };
            let value = if round_up { raw.ceil() } else { raw };
            ColorStop::new(value, color_for(value, domain))
        })
        .collect()
}
