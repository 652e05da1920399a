//! Triangular meshes built from unstructured connectivity.

use crate::error::{ContourError, ContourResult};

/// Nodes in WGS84 degrees plus 0-based triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    x: Vec<f64>,
    y: Vec<f64>,
    triangles: Vec<[usize; 3]>,
}

impl TriMesh {
    pub(crate) fn from_parts(x: Vec<f64>, y: Vec<f64>, triangles: Vec<[usize; 3]>) -> Self {
        Self { x, y, triangles }
    }

    /// Build from 0-based triangles, checking every index.
    pub fn new(x: Vec<f64>, y: Vec<f64>, triangles: Vec<[usize; 3]>) -> ContourResult<Self> {
        if x.len() != y.len() {
            return Err(ContourError::ShapeMismatch(format!(
                "{} x coordinates but {} y coordinates",
                x.len(),
                y.len()
            )));
        }
        if let Some(tri) = triangles.iter().find(|t| t.iter().any(|&n| n >= x.len())) {
            return Err(ContourError::InvalidTopology(format!(
                "triangle {:?} references a node beyond {}",
                tri,
                x.len()
            )));
        }
        Ok(Self { x, y, triangles })
    }

    /// Build from a raw face table in the given index base.
    pub fn from_connectivity(
        x: Vec<f64>,
        y: Vec<f64>,
        faces: &[Vec<i64>],
        start_index: u8,
    ) -> ContourResult<Self> {
        let triangles = normalize_connectivity(faces, start_index, x.len())?;
        Self::new(x, y, triangles)
    }

    pub fn node_count(&self) -> usize {
        self.x.len()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }
}

/// Convert a face table to 0-based triangles.
///
/// Indices below `start_index` (negative fill values included) end a face.
/// Faces with more than three nodes are fan-triangulated from their first
/// node; faces with fewer than three are skipped.
pub fn normalize_connectivity(
    faces: &[Vec<i64>],
    start_index: u8,
    node_count: usize,
) -> ContourResult<Vec<[usize; 3]>> {
    if start_index > 1 {
        return Err(ContourError::InvalidTopology(format!(
            "start index {} (expected 0 or 1)",
            start_index
        )));
    }
    let base = i64::from(start_index);

    let mut triangles = Vec::with_capacity(faces.len());
    for (face_index, face) in faces.iter().enumerate() {
        let mut nodes = Vec::with_capacity(face.len());
        for &raw in face {
            if raw < base {
                break;
            }
            let node = (raw - base) as usize;
            if node >= node_count {
                return Err(ContourError::InvalidTopology(format!(
                    "face {} references node {} but the mesh has {} nodes",
                    face_index, raw, node_count
                )));
            }
            nodes.push(node);
        }
        if nodes.len() < 3 {
            continue;
        }
        for i in 1..nodes.len() - 1 {
            triangles.push([nodes[0], nodes[i], nodes[i + 1]]);
        }
    }
    Ok(triangles)
}

/// Which triangles are excluded because of null vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Masked only when every vertex is null (unstructured meshes).
    AllVertices,
    /// Masked when any vertex is null (triangulated structured grids).
    AnyVertex,
}

/// `true` for each masked triangle.
pub fn triangle_mask(triangles: &[[usize; 3]], values: &[f64], policy: NullPolicy) -> Vec<bool> {
    triangles
        .iter()
        .map(|tri| {
            let mut nulls = tri.iter().map(|&n| values[n].is_nan());
            match policy {
                NullPolicy::AllVertices => nulls.all(|null| null),
                NullPolicy::AnyVertex => nulls.any(|null| null),
            }
        })
        .collect()
}

/// Replace nulls with `sentinel`.
pub fn fill_nulls(values: &[f64], sentinel: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_nan() { sentinel } else { v })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_based_normalized() {
        let tris = normalize_connectivity(&[vec![1, 2, 3], vec![2, 4, 3]], 1, 4).unwrap();
        assert_eq!(tris, vec![[0, 1, 2], [1, 3, 2]]);
    }

    #[test]
    fn test_zero_based_kept() {
        let tris = normalize_connectivity(&[vec![0, 1, 2]], 0, 3).unwrap();
        assert_eq!(tris, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_quad_fan_and_fill_terminator() {
        let faces = vec![vec![0, 1, 2, 3], vec![1, 4, 2, -1]];
        let tris = normalize_connectivity(&faces, 0, 5).unwrap();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [1, 4, 2]]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            normalize_connectivity(&[vec![1, 2, 5]], 1, 4),
            Err(ContourError::InvalidTopology(_))
        ));
        // 0 in a 1-based table terminates the face rather than wrapping.
        assert!(normalize_connectivity(&[vec![0, 1, 2]], 1, 4).unwrap().is_empty());
        assert!(normalize_connectivity(&[vec![0, 1, 2]], 2, 4).is_err());
    }

    #[test]
    fn test_mask_policies() {
        let tris = [[0, 1, 2], [1, 2, 3], [2, 3, 4]];
        let values = [f64::NAN, 1.0, f64::NAN, f64::NAN, f64::NAN];
        assert_eq!(
            triangle_mask(&tris, &values, NullPolicy::AllVertices),
            vec![false, false, true]
        );
        assert_eq!(
            triangle_mask(&tris, &values, NullPolicy::AnyVertex),
            vec![true, true, true]
        );
    }

    #[test]
    fn test_fill_nulls() {
        assert_eq!(fill_nulls(&[1.0, f64::NAN], -9999.0), vec![1.0, -9999.0]);
    }
}
