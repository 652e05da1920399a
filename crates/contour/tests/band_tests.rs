//! Tests for filled band tracing over grids and meshes.

use contour::levels::MASKED_DOMAIN_FLOOR;
use contour::rings::signed_area;
use contour::{contour_grid, contour_mesh, ContourError, ContourLevels, FilledBand, GridSampling, StructuredGrid, TriMesh};
use test_utils::{
    assert_approx_eq, axis, create_constant_grid, create_gaussian_hill, create_noise_grid, create_quadrant_grid,
    create_triangle_mesh, with_nulls,
};

/// Net area of a band: exteriors minus holes.
fn band_area(band: &FilledBand) -> f64 {
    band.rings.iter().map(|ring| signed_area(ring)).sum()
}

// ============================================================================
// Structured grids, cell sampling
// ============================================================================

#[test]
fn test_quadrant_grid_four_squares() {
    let (x, y) = (axis(0.0, 1.0, 4), axis(0.0, 1.0, 4));
    let values = create_quadrant_grid();
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((1.0, 4.0)), 4);

    let bands = contour_grid(&grid, &levels, GridSampling::Cell);
    assert_eq!(bands.len(), 4);

    for (i, band) in bands.iter().enumerate() {
        assert_eq!(band.index, i);
        assert_eq!(band.level, i as f64 + 1.0);
        assert_eq!(band.rings.len(), 1, "band {} should be one square", i);
        assert_eq!(band.rings[0].len(), 4);
        assert_approx_eq!(signed_area(&band.rings[0]), 4.0, 1e-12);
    }

    // Quadrant 1 spans the lower-left cells and their half-cell margins.
    let xs: Vec<f64> = bands[0].rings[0].iter().map(|c| c.x).collect();
    assert!(xs.contains(&-0.5) && xs.contains(&1.5));
}

#[test]
fn test_descending_rows_still_counter_clockwise() {
    // North-to-south rows, as many structured products are stored.
    let (x, y) = (axis(0.0, 1.0, 4), axis(3.0, -1.0, 4));
    let values = create_quadrant_grid();
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((1.0, 4.0)), 4);

    for band in contour_grid(&grid, &levels, GridSampling::Cell) {
        assert_eq!(band.rings.len(), 1);
        assert!(signed_area(&band.rings[0]) > 0.0);
    }
}

#[test]
fn test_flat_field_single_band() {
    let (x, y) = (axis(0.0, 1.0, 3), axis(0.0, 1.0, 3));
    let values = create_constant_grid(3, 3, 2.0);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((2.0, 2.0)), 25);

    let bands = contour_grid(&grid, &levels, GridSampling::Cell);
    assert_eq!(bands.len(), 1);
    assert_eq!(bands[0].upper, f64::INFINITY);
    assert_approx_eq!(band_area(&bands[0]), 9.0, 1e-12);
}

#[test]
fn test_fully_masked_field_yields_nothing() {
    let (x, y) = (axis(0.0, 1.0, 3), axis(0.0, 1.0, 3));
    let values = vec![f64::NAN; 9];
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(None, 25);
    assert_eq!(levels.values(), &[MASKED_DOMAIN_FLOOR]);

    for sampling in [GridSampling::Cell, GridSampling::Linear] {
        let bands = contour_grid(&grid, &levels, sampling);
        assert!(bands.iter().all(FilledBand::is_empty));
    }
}

#[test]
fn test_null_cell_becomes_hole() {
    let (x, y) = (axis(0.0, 1.0, 3), axis(0.0, 1.0, 3));
    let values = with_nulls(create_constant_grid(3, 3, 1.0), 3, &[(1, 1)]);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((1.0, 1.0)), 25);

    let bands = contour_grid(&grid, &levels, GridSampling::Cell);
    assert_eq!(bands[0].rings.len(), 2);
    assert_approx_eq!(band_area(&bands[0]), 8.0, 1e-12);
}

#[test]
fn test_cell_bands_partition_extent() {
    let (width, height) = (30, 20);
    let (x, y) = (axis(0.0, 1.0, width), axis(0.0, 1.0, height));
    let values = create_noise_grid(width, height, 10.0, 7);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let domain = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let levels = ContourLevels::evenly_spaced(Some(domain), 25);

    let bands = contour_grid(&grid, &levels, GridSampling::Cell);
    let total: f64 = bands.iter().map(band_area).sum();
    assert_approx_eq!(total, (width * height) as f64, 1e-9);
}

// ============================================================================
// Structured grids, linear sampling
// ============================================================================

#[test]
fn test_linear_bands_partition_hull() {
    let (width, height) = (15, 11);
    let (x, y) = (axis(-80.0, 0.5, width), axis(30.0, 0.5, height));
    let values = create_gaussian_hill(width, height, 4.0);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let levels = ContourLevels::evenly_spaced(Some((min, 4.0)), 8);

    let bands = contour_grid(&grid, &levels, GridSampling::Linear);
    assert_eq!(bands.len(), 8);
    let total: f64 = bands.iter().map(band_area).sum();
    assert_approx_eq!(total, 7.0 * 5.0, 1e-9);

    // The last band only holds the peak node itself; the one below it is an
    // island around the peak.
    assert!(bands[7].is_empty());
    let top = &bands[6];
    assert!(!top.is_empty());
    assert!(top.rings.iter().all(|ring| signed_area(ring) > 0.0));
}

#[test]
fn test_linear_sampling_masks_cells_touching_nulls() {
    let (x, y) = (axis(0.0, 1.0, 3), axis(0.0, 1.0, 3));
    let values = with_nulls(create_constant_grid(3, 3, 1.0), 3, &[(0, 0)]);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((1.0, 1.0)), 25);

    let bands = contour_grid(&grid, &levels, GridSampling::Linear);
    // The two triangles of the lower-left cell touch the null node.
    assert_approx_eq!(band_area(&bands[0]), 3.0, 1e-12);
}

#[test]
fn test_contouring_is_deterministic() {
    let (x, y) = (axis(0.0, 0.1, 25), axis(0.0, 0.1, 25));
    let values = create_noise_grid(25, 25, 3.0, 11);
    let grid = StructuredGrid::new(&x, &y, &values).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((0.0, 3.0)), 10);

    for sampling in [GridSampling::Cell, GridSampling::Linear] {
        let first = contour_grid(&grid, &levels, sampling);
        let second = contour_grid(&grid, &levels, sampling);
        assert_eq!(first, second);
    }
}

// ============================================================================
// Unstructured meshes
// ============================================================================

#[test]
fn test_mesh_one_based_connectivity() {
    let (x, y, faces) = create_triangle_mesh();
    let mesh = TriMesh::from_connectivity(x, y, &faces, 1).unwrap();
    assert_eq!(mesh.triangles()[0], [0, 1, 2]);

    let values = vec![1.0; mesh.node_count()];
    let levels = ContourLevels::evenly_spaced(Some((1.0, 1.0)), 25);
    let bands = contour_mesh(&mesh, &values, &levels).unwrap();

    // The unit square and the outlying triangle.
    assert_eq!(bands[0].rings.len(), 2);
    assert_approx_eq!(band_area(&bands[0]), 1.5, 1e-12);
}

#[test]
fn test_mesh_all_null_triangle_masked() {
    let (x, y, faces) = create_triangle_mesh();
    let mesh = TriMesh::from_connectivity(x, y, &faces, 1).unwrap();
    let values = vec![1.0, 1.0, 1.0, 1.0, f64::NAN, f64::NAN, f64::NAN];
    let levels = ContourLevels::evenly_spaced(Some((1.0, 1.0)), 25);

    let bands = contour_mesh(&mesh, &values, &levels).unwrap();
    assert_eq!(bands[0].rings.len(), 1);
    assert_approx_eq!(band_area(&bands[0]), 1.0, 1e-12);
}

#[test]
fn test_mesh_partial_null_uses_sentinel() {
    let (x, y, faces) = create_triangle_mesh();
    let mesh = TriMesh::from_connectivity(x, y, &faces, 1).unwrap();
    // One null vertex: the triangle stays active but its null corner sits
    // below every band, leaving only a degenerate sliver at the level.
    let values = vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, f64::NAN];
    let levels = ContourLevels::evenly_spaced(Some((1.0, 1.0)), 25);

    let bands = contour_mesh(&mesh, &values, &levels).unwrap();
    assert_approx_eq!(band_area(&bands[0]), 1.0, 1e-12);
}

#[test]
fn test_mesh_interpolates_between_nodes() {
    let mesh = TriMesh::new(vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0], vec![[0, 1, 2]]).unwrap();
    let values = [0.0, 2.0, 2.0];
    let levels = ContourLevels::explicit(vec![0.0, 1.0]).unwrap();

    let bands = contour_mesh(&mesh, &values, &levels).unwrap();
    assert_approx_eq!(band_area(&bands[0]), 0.125, 1e-12);
    assert_approx_eq!(band_area(&bands[1]), 0.375, 1e-12);
}

#[test]
fn test_mesh_value_count_checked() {
    let (x, y, faces) = create_triangle_mesh();
    let mesh = TriMesh::from_connectivity(x, y, &faces, 1).unwrap();
    let levels = ContourLevels::evenly_spaced(Some((0.0, 1.0)), 2);
    assert!(matches!(
        contour_mesh(&mesh, &[1.0, 2.0], &levels),
        Err(ContourError::ShapeMismatch(_))
    ));
}

#[test]
fn test_mesh_zero_based_matches_one_based() {
    let (x, y, faces) = create_triangle_mesh();
    let zero_based: Vec<Vec<i64>> = faces.iter().map(|f| f.iter().map(|n| n - 1).collect()).collect();
    let a = TriMesh::from_connectivity(x.clone(), y.clone(), &faces, 1).unwrap();
    let b = TriMesh::from_connectivity(x, y, &zero_based, 0).unwrap();
    assert_eq!(a, b);
}
