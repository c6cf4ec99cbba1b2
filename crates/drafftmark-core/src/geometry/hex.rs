//! Outer boundary of a small cluster of hexes on the host grid.
//!
//! Every hex contributes its six directed edges. Two adjacent hexes share an
//! edge in opposite directions, so dropping each edge whose reverse is also
//! present leaves exactly the outer boundary of the union, which is then
//! stitched back into one closed path.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use kurbo::{Point, Vec2};

use super::stamp::SymbolSize;
use crate::grid::{GridDescriptor, HexOrientation};

/// Axial offsets of the first ring around a cell.
const RING_1: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// Axial offsets of the second ring around a cell.
const RING_2: [(i32, i32); 12] = [
    (2, 0),
    (2, -1),
    (2, -2),
    (1, -2),
    (0, -2),
    (-1, -1),
    (-2, 0),
    (-2, 1),
    (-2, 2),
    (-1, 2),
    (0, 2),
    (1, 1),
];

/// Maximum distance, in pixels, for the stitched path to count as closed.
const CLOSE_TOLERANCE: f64 = 0.5;

/// Vertex coordinates snapped to the half-pixel lattice, in half pixels.
type VertexKey = (i64, i64);
type Edge = (VertexKey, VertexKey);

/// Axial coordinates of the cells covered by a stamp of the given tier.
pub fn cluster_cells(size: SymbolSize) -> Vec<(i32, i32)> {
    let mut cells = vec![(0, 0)];
    if size.hex_rings() >= 1 {
        cells.extend(RING_1);
    }
    if size.hex_rings() >= 2 {
        cells.extend(RING_2);
    }
    cells
}

/// Closed outline of the hex cluster centered at `center`.
///
/// The first and last points coincide. Falls back to a single hex if the
/// boundary cannot be stitched into one loop.
pub fn hex_cluster_outline(center: Point, size: SymbolSize, grid: &GridDescriptor) -> Vec<Point> {
    let orientation = grid.orientation();
    let radius = grid.vertex_radius();

    let edges = boundary_edges(&cluster_cells(size), center, radius, orientation);
    match stitch(&edges) {
        Some(outline) => outline,
        None => {
            log::debug!("hex cluster boundary did not close, drawing a single hex");
            single_hex(center, radius, orientation)
        }
    }
}

/// Closed outline of one hex.
pub fn single_hex(center: Point, radius: f64, orientation: HexOrientation) -> Vec<Point> {
    let vertices = hex_vertices(center, radius, orientation);
    let mut outline = vertices.to_vec();
    outline.push(vertices[0]);
    outline
}

fn axial_to_pixel(q: i32, r: i32, radius: f64, orientation: HexOrientation) -> Vec2 {
    let (q, r) = (f64::from(q), f64::from(r));
    let sqrt3 = 3f64.sqrt();
    match orientation {
        HexOrientation::PointyTop => Vec2::new(radius * sqrt3 * (q + r / 2.0), radius * 1.5 * r),
        HexOrientation::FlatTop => Vec2::new(radius * 1.5 * q, radius * sqrt3 * (r + q / 2.0)),
    }
}

/// Six vertices at 60° steps, angles measured clockwise from straight up.
fn hex_vertices(center: Point, radius: f64, orientation: HexOrientation) -> [Point; 6] {
    let start = match orientation {
        HexOrientation::PointyTop => 0.0,
        HexOrientation::FlatTop => 30.0,
    };
    std::array::from_fn(|i| {
        let angle = (start + 60.0 * i as f64) * PI / 180.0;
        Point::new(center.x + radius * angle.sin(), center.y - radius * angle.cos())
    })
}

fn snap(p: Point) -> VertexKey {
    ((p.x * 2.0).round() as i64, (p.y * 2.0).round() as i64)
}

fn unsnap(key: VertexKey) -> Point {
    Point::new(key.0 as f64 / 2.0, key.1 as f64 / 2.0)
}

/// Directed edges of the union's outer boundary, in a deterministic order.
fn boundary_edges(
    cells: &[(i32, i32)],
    center: Point,
    radius: f64,
    orientation: HexOrientation,
) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(cells.len() * 6);
    for &(q, r) in cells {
        let cell_center = center + axial_to_pixel(q, r, radius, orientation);
        let vertices = hex_vertices(cell_center, radius, orientation).map(snap);
        for i in 0..6 {
            let edge = (vertices[i], vertices[(i + 1) % 6]);
            if edge.0 != edge.1 {
                edges.push(edge);
            }
        }
    }

    let present: HashSet<Edge> = edges.iter().copied().collect();
    edges
        .into_iter()
        .filter(|(a, b)| !present.contains(&(*b, *a)))
        .collect()
}

/// Chain undirected edges into one closed path, or `None` if they do not form a single loop.
fn stitch(edges: &[Edge]) -> Option<Vec<Point>> {
    let (&(start, second), _) = edges.split_first()?;

    let mut by_vertex: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (i, (a, b)) in edges.iter().enumerate() {
        by_vertex.entry(*a).or_default().push(i);
        by_vertex.entry(*b).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    used[0] = true;
    let mut path = vec![unsnap(start), unsnap(second)];
    let mut current = second;

    while unsnap(current).distance(unsnap(start)) > CLOSE_TOLERANCE {
        let next = by_vertex
            .get(&current)?
            .iter()
            .copied()
            .find(|&i| !used[i])?;
        used[next] = true;
        let (a, b) = edges[next];
        current = if a == current { b } else { a };
        path.push(unsnap(current));
    }

    // Leftover edges mean a second loop (a hole or a disconnected cell).
    if used.iter().any(|u| !u) {
        return None;
    }
    Some(path)
}
