//! Filled contour bands.
//!
//! Every band is built the same way: the area of each grid cell or mesh
//! triangle that falls inside the band is emitted as a small counter-clockwise
//! piece, edges shared by two pieces cancel, and the surviving directed edges
//! are walked into closed rings. Region stays on the left of every ring, so
//! exteriors come out counter-clockwise and holes clockwise.
//!
//! Crossing points on a mesh edge are always interpolated from the edge's two
//! node indices in ascending order, so the two triangles sharing an edge
//! produce bit-identical coordinates and their common edges cancel exactly.
//! All maps are ordered, which keeps the output deterministic.

use std::collections::{BTreeMap, HashMap};

use geo::Coord;
use rayon::prelude::*;
use tracing::debug;

use crate::error::ContourResult;
use crate::grid::{cell_edges, GridSampling, StructuredGrid};
use crate::levels::ContourLevels;
use crate::mesh::{fill_nulls, triangle_mask, NullPolicy, TriMesh};

/// An open ring (first coordinate not repeated at the end).
pub type Ring = Vec<Coord<f64>>;

/// The traced boundary of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledBand {
    pub index: usize,
    /// Lower bound; also the value recorded for the band.
    pub level: f64,
    /// Exclusive upper bound, infinite for the last band.
    pub upper: f64,
    pub rings: Vec<Ring>,
}

impl FilledBand {
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

/// Contour a structured grid.
pub fn contour_grid(grid: &StructuredGrid<'_>, levels: &ContourLevels, sampling: GridSampling) -> Vec<FilledBand> {
    match sampling {
        GridSampling::Cell => contour_cells(grid, levels),
        GridSampling::Linear => {
            let mesh = grid.to_mesh();
            let mask = triangle_mask(mesh.triangles(), grid.values(), NullPolicy::AnyVertex);
            let values = fill_nulls(grid.values(), levels.sentinel());
            contour_triangles(&mesh, &values, &mask, levels)
        }
    }
}

/// Contour per-node values on a triangular mesh.
///
/// Triangles whose vertices are all null are skipped; remaining nulls take a
/// sentinel below the first level so they fall outside every band.
pub fn contour_mesh(mesh: &TriMesh, values: &[f64], levels: &ContourLevels) -> ContourResult<Vec<FilledBand>> {
    if values.len() != mesh.node_count() {
        return Err(crate::ContourError::ShapeMismatch(format!(
            "{} values for {} mesh nodes",
            values.len(),
            mesh.node_count()
        )));
    }
    let mask = triangle_mask(mesh.triangles(), values, NullPolicy::AllVertices);
    let filled = fill_nulls(values, levels.sentinel());
    Ok(contour_triangles(mesh, &filled, &mask, levels))
}

fn contour_cells(grid: &StructuredGrid<'_>, levels: &ContourLevels) -> Vec<FilledBand> {
    let x_edges = cell_edges(grid.x_axis());
    let y_edges = cell_edges(grid.y_axis());
    // Descending axes (e.g. north-to-south rows) flip the cell winding.
    let ascending = |edges: &[f64]| edges.last() >= edges.first();
    let clockwise = ascending(&x_edges) != ascending(&y_edges);

    let mut cells_by_band: Vec<Vec<(usize, usize)>> = vec![Vec::new(); levels.len()];
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if let Some(band) = levels.band_of(grid.value(row, col)) {
                cells_by_band[band].push((row, col));
            }
        }
    }

    cells_by_band
        .into_par_iter()
        .enumerate()
        .map(|(index, cells)| {
            let mut tracer = EdgeTracer::default();
            for (row, col) in cells {
                let corners = StructuredGrid::cell_corners(&x_edges, &y_edges, row, col);
                tracer.add_piece(&corners, clockwise);
            }
            finish_band(index, levels, tracer)
        })
        .collect()
}

fn contour_triangles(mesh: &TriMesh, values: &[f64], mask: &[bool], levels: &ContourLevels) -> Vec<FilledBand> {
    let clipper = Clipper {
        x: mesh.x(),
        y: mesh.y(),
        v: values,
    };

    // Triangles that can contribute, with their value range and orientation.
    let active: Vec<([usize; 3], f64, f64, bool)> = mesh
        .triangles()
        .iter()
        .zip(mask)
        .filter(|(_, &masked)| !masked)
        .filter_map(|(&tri, _)| {
            let area2 = clipper.signed_area2(tri);
            if area2 == 0.0 || area2.is_nan() {
                return None;
            }
            let vals = tri.map(|n| values[n]);
            let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some((tri, min, max, area2 < 0.0))
        })
        .collect();

    (0..levels.len())
        .into_par_iter()
        .map(|index| {
            let (lower, upper) = levels.band_bounds(index);
            let mut tracer = EdgeTracer::default();
            for &(tri, min, max, clockwise) in &active {
                // Flat triangles at the upper bound belong to the next band.
                if max < lower || min >= upper {
                    continue;
                }
                if let Some(piece) = clipper.band_piece(tri, lower, upper) {
                    tracer.add_piece(&piece, clockwise);
                }
            }
            finish_band(index, levels, tracer)
        })
        .collect()
}

fn finish_band(index: usize, levels: &ContourLevels, tracer: EdgeTracer) -> FilledBand {
    let (level, upper) = levels.band_bounds(index);
    let rings = tracer.trace();
    debug!(band = index, level, rings = rings.len(), "Traced contour band");
    FilledBand {
        index,
        level,
        upper,
        rings,
    }
}

// ============================================================================
// Triangle clipping
// ============================================================================

/// A polygon vertex during clipping: a mesh node, or the point where
/// `level` crosses the mesh edge `(a, b)` with `a < b`.
#[derive(Debug, Clone, Copy)]
enum Node {
    Vertex(usize),
    Cross { a: usize, b: usize, level: f64 },
}

struct Clipper<'a> {
    x: &'a [f64],
    y: &'a [f64],
    v: &'a [f64],
}

impl Clipper<'_> {
    fn signed_area2(&self, tri: [usize; 3]) -> f64 {
        let [a, b, c] = tri;
        (self.x[b] - self.x[a]) * (self.y[c] - self.y[a]) - (self.x[c] - self.x[a]) * (self.y[b] - self.y[a])
    }

    fn value(&self, node: Node) -> f64 {
        match node {
            Node::Vertex(i) => self.v[i],
            Node::Cross { level, .. } => level,
        }
    }

    fn coord(&self, node: Node) -> Coord<f64> {
        match node {
            Node::Vertex(i) => Coord {
                x: self.x[i],
                y: self.y[i],
            },
            Node::Cross { a, b, level } => {
                let t = (level - self.v[a]) / (self.v[b] - self.v[a]);
                if !(t > 0.0) {
                    self.coord(Node::Vertex(a))
                } else if t >= 1.0 {
                    self.coord(Node::Vertex(b))
                } else {
                    Coord {
                        x: self.x[a] + t * (self.x[b] - self.x[a]),
                        y: self.y[a] + t * (self.y[b] - self.y[a]),
                    }
                }
            }
        }
    }

    /// The mesh edge a clip-polygon edge lies on, if any.
    fn mesh_edge(p: Node, q: Node) -> Option<(usize, usize)> {
        match (p, q) {
            (Node::Vertex(i), Node::Vertex(j)) => Some((i.min(j), i.max(j))),
            (Node::Vertex(i), Node::Cross { a, b, .. }) | (Node::Cross { a, b, .. }, Node::Vertex(i))
                if i == a || i == b =>
            {
                Some((a, b))
            }
            (Node::Cross { a, b, .. }, Node::Cross { a: c, b: d, .. }) if (a, b) == (c, d) => Some((a, b)),
            _ => None,
        }
    }

    /// One Sutherland-Hodgman pass keeping values `>= level` (or `<= level`).
    fn clip(&self, polygon: &[Node], level: f64, keep_above: bool) -> Vec<Node> {
        let inside = |n: Node| {
            let v = self.value(n);
            if keep_above {
                v >= level
            } else {
                v <= level
            }
        };

        let mut out = Vec::with_capacity(polygon.len() + 2);
        for (i, &current) in polygon.iter().enumerate() {
            let next = polygon[(i + 1) % polygon.len()];
            let (current_in, next_in) = (inside(current), inside(next));
            if current_in {
                out.push(current);
            }
            if current_in != next_in {
                if let Some((a, b)) = Self::mesh_edge(current, next) {
                    out.push(Node::Cross { a, b, level });
                }
            }
        }
        out
    }

    /// The part of a triangle inside `[lower, upper]`, in the triangle's
    /// winding order, or `None` if it has no area.
    fn band_piece(&self, tri: [usize; 3], lower: f64, upper: f64) -> Option<Vec<Coord<f64>>> {
        let mut polygon: Vec<Node> = tri.iter().map(|&n| Node::Vertex(n)).collect();
        polygon = self.clip(&polygon, lower, true);
        if upper.is_finite() && polygon.len() >= 3 {
            polygon = self.clip(&polygon, upper, false);
        }

        let mut coords: Vec<Coord<f64>> = Vec::with_capacity(polygon.len());
        for node in polygon {
            let c = self.coord(node);
            if coords.last() != Some(&c) {
                coords.push(c);
            }
        }
        while coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }

        (coords.len() >= 3 && signed_area(&coords) != 0.0).then_some(coords)
    }
}

fn signed_area(coords: &[Coord<f64>]) -> f64 {
    let n = coords.len();
    (0..n)
        .map(|i| {
            let (p, q) = (coords[i], coords[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

// ============================================================================
// Edge cancellation and ring tracing
// ============================================================================

type Key = (u64, u64);

fn key(c: Coord<f64>) -> Key {
    // -0.0 and 0.0 must hash alike.
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(c.x).to_bits(), norm(c.y).to_bits())
}

#[derive(Default)]
struct EdgeTracer {
    edges: BTreeMap<(Key, Key), u32>,
    coords: BTreeMap<Key, Coord<f64>>,
}

impl EdgeTracer {
    /// Add a convex piece, wound clockwise if `clockwise` is set. Edges
    /// matching an existing edge in the opposite direction cancel it.
    fn add_piece(&mut self, piece: &[Coord<f64>], clockwise: bool) {
        let n = piece.len();
        for i in 0..n {
            let (mut p, mut q) = (piece[i], piece[(i + 1) % n]);
            if clockwise {
                std::mem::swap(&mut p, &mut q);
            }
            let (kp, kq) = (key(p), key(q));
            if kp == kq {
                continue;
            }
            self.coords.insert(kp, p);
            self.coords.insert(kq, q);

            match self.edges.get_mut(&(kq, kp)) {
                Some(count) => {
                    *count -= 1;
                    if *count == 0 {
                        self.edges.remove(&(kq, kp));
                    }
                }
                None => *self.edges.entry((kp, kq)).or_insert(0) += 1,
            }
        }
    }

    fn trace(self) -> Vec<Ring> {
        let mut outgoing: BTreeMap<Key, Vec<Key>> = BTreeMap::new();
        for (&(from, to), &count) in &self.edges {
            for _ in 0..count {
                outgoing.entry(from).or_default().push(to);
            }
        }

        let starts: Vec<Key> = outgoing.keys().copied().collect();
        let mut rings = Vec::new();
        for start in starts {
            while let Some(path) = self.walk(&mut outgoing, start) {
                for ring in split_loops(path) {
                    let coords: Ring = ring.iter().map(|k| self.coords[k]).collect();
                    let coords = drop_collinear(coords);
                    if coords.len() >= 3 {
                        rings.push(coords);
                    }
                }
            }
        }
        rings
    }

    /// Follow edges from `start` until returning to it, taking the
    /// left-most turn wherever several edges leave a vertex.
    fn walk(&self, outgoing: &mut BTreeMap<Key, Vec<Key>>, start: Key) -> Option<Vec<Key>> {
        let first = take_next(outgoing, start, |_| 0.0)?;
        let mut path = vec![start];
        let (mut prev, mut current) = (start, first);

        while current != start {
            path.push(current);
            let (from, via) = (self.coords[&prev], self.coords[&current]);
            let next = take_next(outgoing, current, |to| turn_angle(from, via, self.coords[to]));
            match next {
                Some(next) => {
                    prev = current;
                    current = next;
                }
                None => break,
            }
        }
        Some(path)
    }
}

/// Remove and return the outgoing edge of `from` with the largest score.
fn take_next(outgoing: &mut BTreeMap<Key, Vec<Key>>, from: Key, score: impl Fn(&Key) -> f64) -> Option<Key> {
    let targets = outgoing.get_mut(&from)?;
    if targets.is_empty() {
        return None;
    }
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, to) in targets.iter().enumerate() {
        let s = score(to);
        if s > best_score {
            best = i;
            best_score = s;
        }
    }
    Some(targets.remove(best))
}

/// Signed turn from `from -> via` to `via -> to`, positive to the left.
fn turn_angle(from: Coord<f64>, via: Coord<f64>, to: Coord<f64>) -> f64 {
    let (dx1, dy1) = (via.x - from.x, via.y - from.y);
    let (dx2, dy2) = (to.x - via.x, to.y - via.y);
    (dx1 * dy2 - dy1 * dx2).atan2(dx1 * dx2 + dy1 * dy2)
}

/// Split a closed path that revisits vertices into simple loops.
fn split_loops(path: Vec<Key>) -> Vec<Vec<Key>> {
    let mut loops = Vec::new();
    let mut stack: Vec<Key> = Vec::with_capacity(path.len());
    let mut position: HashMap<Key, usize> = HashMap::with_capacity(path.len());

    for k in path {
        if let Some(&at) = position.get(&k) {
            let closed: Vec<Key> = stack.drain(at + 1..).collect();
            for popped in &closed {
                position.remove(popped);
            }
            let mut ring = Vec::with_capacity(closed.len() + 1);
            ring.push(k);
            ring.extend(closed);
            loops.push(ring);
        } else {
            position.insert(k, stack.len());
            stack.push(k);
        }
    }
    loops.push(stack);
    loops.retain(|ring| ring.len() >= 3);
    loops
}

/// Drop vertices lying exactly on the line through their neighbours.
fn drop_collinear(ring: Ring) -> Ring {
    let collinear = |a: Coord<f64>, b: Coord<f64>, c: Coord<f64>| {
        (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y) == 0.0
    };

    let mut out: Ring = Vec::with_capacity(ring.len());
    for c in ring {
        while out.len() >= 2 && collinear(out[out.len() - 2], out[out.len() - 1], c) {
            out.pop();
        }
        out.push(c);
    }

    // Seam between the last and first vertices.
    loop {
        let n = out.len();
        if n < 3 {
            return out;
        }
        if collinear(out[n - 2], out[n - 1], out[0]) {
            out.pop();
        } else if collinear(out[n - 1], out[0], out[1]) {
            out.remove(0);
        } else {
            return out;
        }
    }
}
