//! Structured (rectilinear) grids.

use std::str::FromStr;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::{ContourError, ContourResult};
use crate::mesh::TriMesh;

/// How node values on a structured grid are turned into areas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSampling {
    /// Each node value fills the cell around it, bounded by the midpoints to
    /// its neighbours.
    #[default]
    Cell,
    /// Cells are split into triangles and values interpolated linearly.
    Linear,
}

impl FromStr for GridSampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cell" => Ok(GridSampling::Cell),
            "linear" => Ok(GridSampling::Linear),
            other => Err(format!("unknown grid sampling '{}'", other)),
        }
    }
}

/// A row-major `[y, x]` field over 1-D coordinate axes. Nulls are NaN.
#[derive(Debug, Clone, Copy)]
pub struct StructuredGrid<'a> {
    x: &'a [f64],
    y: &'a [f64],
    values: &'a [f64],
}

impl<'a> StructuredGrid<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64], values: &'a [f64]) -> ContourResult<Self> {
        if x.is_empty() || y.is_empty() {
            return Err(ContourError::ShapeMismatch("empty coordinate axis".to_string()));
        }
        if values.len() != x.len() * y.len() {
            return Err(ContourError::ShapeMismatch(format!(
                "{} values for a {}x{} grid",
                values.len(),
                y.len(),
                x.len()
            )));
        }
        Ok(Self { x, y, values })
    }

    pub fn rows(&self) -> usize {
        self.y.len()
    }

    pub fn cols(&self) -> usize {
        self.x.len()
    }

    pub fn x_axis(&self) -> &'a [f64] {
        self.x
    }

    pub fn y_axis(&self) -> &'a [f64] {
        self.y
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.x.len() + col]
    }

    /// Corners of the cell around node `(row, col)`, counter-clockwise for
    /// ascending axes.
    pub(crate) fn cell_corners(x_edges: &[f64], y_edges: &[f64], row: usize, col: usize) -> [Coord<f64>; 4] {
        let (x0, x1) = (x_edges[col], x_edges[col + 1]);
        let (y0, y1) = (y_edges[row], y_edges[row + 1]);
        [
            Coord { x: x0, y: y0 },
            Coord { x: x1, y: y0 },
            Coord { x: x1, y: y1 },
            Coord { x: x0, y: y1 },
        ]
    }

    /// Triangulate the grid: two triangles per cell over the grid nodes.
    pub fn to_mesh(&self) -> TriMesh {
        let (rows, cols) = (self.rows(), self.cols());
        let mut x = Vec::with_capacity(rows * cols);
        let mut y = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                x.push(self.x[c]);
                y.push(self.y[r]);
            }
        }

        let mut triangles = Vec::with_capacity(2 * rows.saturating_sub(1) * cols.saturating_sub(1));
        for r in 0..rows.saturating_sub(1) {
            for c in 0..cols.saturating_sub(1) {
                let n00 = r * cols + c;
                let n01 = n00 + 1;
                let n10 = n00 + cols;
                let n11 = n10 + 1;
                triangles.push([n00, n01, n11]);
                triangles.push([n00, n11, n10]);
            }
        }

        TriMesh::from_parts(x, y, triangles)
    }
}

/// Cell boundaries for an axis: midpoints between nodes, with the outer
/// cells extended by half the neighbouring spacing.
pub fn cell_edges(axis: &[f64]) -> Vec<f64> {
    match axis.len() {
        0 => Vec::new(),
        1 => vec![axis[0], axis[0]],
        n => {
            let mut edges = Vec::with_capacity(n + 1);
            edges.push(axis[0] - (axis[1] - axis[0]) / 2.0);
            edges.extend(axis.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            edges.push(axis[n - 1] + (axis[n - 1] - axis[n - 2]) / 2.0);
            edges
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_edges() {
        assert_eq!(cell_edges(&[0.0, 1.0, 3.0]), vec![-0.5, 0.5, 2.0, 4.0]);
        assert_eq!(cell_edges(&[5.0]), vec![5.0, 5.0]);
        assert!(cell_edges(&[]).is_empty());
    }

    #[test]
    fn test_shape_checked() {
        let x = [0.0, 1.0];
        let y = [0.0, 1.0, 2.0];
        assert!(StructuredGrid::new(&x, &y, &[0.0; 6]).is_ok());
        assert!(StructuredGrid::new(&x, &y, &[0.0; 5]).is_err());
        assert!(StructuredGrid::new(&[], &y, &[]).is_err());
    }

    #[test]
    fn test_to_mesh_counts() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0];
        let values = [0.0; 6];
        let mesh = StructuredGrid::new(&x, &y, &values).unwrap().to_mesh();
        assert_eq!(mesh.node_count(), 6);
        assert_eq!(mesh.triangles().len(), 4);
    }

    #[test]
    fn test_sampling_from_str() {
        assert_eq!("cell".parse::<GridSampling>().unwrap(), GridSampling::Cell);
        assert_eq!("LINEAR".parse::<GridSampling>().unwrap(), GridSampling::Linear);
        assert!("cubic".parse::<GridSampling>().is_err());
    }
}
