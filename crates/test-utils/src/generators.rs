//! Synthetic field generators.
//!
//! Every generator returns row-major `[y, x]` values with nulls as NaN,
//! matching what the dataset loader hands to the contour builder. Use
//! [`to_options`] to turn them into dataset fixture cells.

/// An evenly spaced coordinate axis.
///
/// ```
/// use test_utils::axis;
///
/// assert_eq!(axis(-80.0, 0.5, 3), vec![-80.0, -79.5, -79.0]);
/// ```
pub fn axis(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// A 4x4 grid split into four 2x2 quadrants valued 1, 2, 3 and 4.
///
/// Quadrant values increase left to right, then bottom to top, starting
/// at zero:
///
/// ```text
/// row 3: 2 2 3 3
/// row 2: 2 2 3 3
/// row 1: 0 0 1 1
/// row 0: 0 0 1 1
/// ```
pub fn create_zero_based_quadrant_grid() -> Vec<f64> {
    let mut data = Vec::with_capacity(16);
    for row in 0..4 {
        for col in 0..4 {
            data.push(((row / 2) * 2 + col / 2) as f64);
        }
    }
    data
}

/// [`create_zero_based_quadrant_grid`] shifted up by one, so every value
/// is positive.
pub fn create_quadrant_grid() -> Vec<f64> {
    create_zero_based_quadrant_grid().into_iter().map(|v| v + 1.0).collect()
}

/// `rows` copies of one row, row-major.
pub fn create_row_repeated_grid(row: &[f64], rows: usize) -> Vec<f64> {
    row.iter().copied().cycle().take(row.len() * rows).collect()
}

/// Wind direction and speed on a 3x3 grid with a null centre.
///
/// Returns `(direction_degrees, speed_m_s)`; the eight outer cells carry
/// distinct values.
pub fn create_wind_grids() -> (Vec<f64>, Vec<f64>) {
    let mut direction = Vec::with_capacity(9);
    let mut speed = Vec::with_capacity(9);
    for i in 0..9 {
        if i == 4 {
            direction.push(f64::NAN);
            speed.push(f64::NAN);
        } else {
            direction.push(i as f64 * 45.0);
            speed.push(5.0 + i as f64);
        }
    }
    (direction, speed)
}

/// Concentric square rings of increasing value toward the centre.
///
/// Cell value is `1 + min distance to the border`, so a 7x7 grid holds
/// values 1 (outer ring) up to 4 (centre cell). Contouring it yields nested
/// polygons with holes.
pub fn create_nested_rings_grid(size: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let depth = row.min(col).min(size - 1 - row).min(size - 1 - col);
            data.push(depth as f64 + 1.0);
        }
    }
    data
}

/// A smooth hill peaking at `peak` in the middle of the grid, falling to
/// roughly zero at the edges.
pub fn create_gaussian_hill(width: usize, height: usize, peak: f64) -> Vec<f64> {
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;
    let sigma = (width.min(height) as f64 / 4.0).max(1.0);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            data.push(peak * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp());
        }
    }
    data
}

/// A deterministic rough field in `[0, max)`, for stress tests and benches.
pub fn create_noise_grid(width: usize, height: usize, max: f64, seed: u32) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            data.push((hash % 10_000) as f64 / 10_000.0 * max);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// A grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}

/// A copy of `values` with NaN at the given `(col, row)` positions.
pub fn with_nulls(mut values: Vec<f64>, width: usize, nulls: &[(usize, usize)]) -> Vec<f64> {
    for &(col, row) in nulls {
        let index = row * width + col;
        if col < width && index < values.len() {
            values[index] = f64::NAN;
        }
    }
    values
}

/// NaN-as-null values to explicit optional cells.
pub fn to_options(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| (!v.is_nan()).then_some(v)).collect()
}

/// A small unstructured mesh: the unit square split into two triangles,
/// plus an outlying triangle. Returns `(x, y, faces)` with 1-based faces.
pub fn create_triangle_mesh() -> (Vec<f64>, Vec<f64>, Vec<Vec<i64>>) {
    let x = vec![0.0, 1.0, 1.0, 0.0, 3.0, 4.0, 3.5];
    let y = vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
    let faces = vec![vec![1, 2, 3], vec![1, 3, 4], vec![5, 6, 7]];
    (x, y, faces)
}
