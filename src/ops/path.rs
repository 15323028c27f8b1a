// ============================================================================
// PATH PROCESSING — stroke simplification, smoothing, cluster vectorization
// ============================================================================

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TraceError;

/// A real-valued point on a pointer trajectory, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Distance from `p` to the infinite line through `start` and `end`.
/// A zero-length base degrades to the distance from `start`.
fn perpendicular_distance(p: Point, start: Point, end: Point) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-12 {
        return p.distance(start);
    }

    let area = (dx * (start.y - p.y) - (start.x - p.x) * dy).abs();
    area / len_sq.sqrt()
}

/// Ramer-Douglas-Peucker polyline simplification.
///
/// A run collapses onto its endpoints when no interior point is farther than
/// `epsilon` from the chord; otherwise it splits at the farthest point. The
/// recursion is driven by an explicit stack so very long strokes are safe.
/// Negative or NaN tolerances behave as zero.
pub fn simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let epsilon = if epsilon.is_nan() { 0.0 } else { epsilon.max(0.0) };

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut pending = vec![(0usize, n - 1)];
    while let Some((start, end)) = pending.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_dist = f64::NEG_INFINITY;
        let mut max_idx = start;
        for i in start + 1..end {
            let d = perpendicular_distance(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }
        if max_dist > epsilon {
            keep[max_idx] = true;
            pending.push((start, max_idx));
            pending.push((max_idx, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Moving-average smoothing with a symmetric window of radius `strength`.
///
/// Near the ends the radius shrinks to the distance from the nearest end, so
/// windows never wrap and the first and last points stay where they are.
pub fn smooth(points: &[Point], strength: usize) -> Vec<Point> {
    let n = points.len();
    if strength == 0 || n < 3 {
        return points.to_vec();
    }

    (0..n)
        .map(|i| {
            let r = strength.min(i).min(n - 1 - i);
            if r == 0 {
                return points[i];
            }
            let window = &points[i - r..=i + r];
            let count = window.len() as f64;
            let (sx, sy) = window
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            Point::new(sx / count, sy / count)
        })
        .collect()
}

// ----------------------------------------------------------------------------
//  Cluster contour tracing
// ----------------------------------------------------------------------------

/// Corner vertices of one closed contour, as `(x, y)` grid coordinates.
/// The closing edge back to the first vertex is implicit.
pub type Contour = Vec<(u64, u64)>;

/// Heading of a unit boundary edge in screen coordinates (y grows downward).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    fn bit(self) -> u8 {
        match self {
            Dir::East => 1,
            Dir::South => 2,
            Dir::West => 4,
            Dir::North => 8,
        }
    }

    fn right(self) -> Dir {
        match self {
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
            Dir::North => Dir::East,
        }
    }

    fn left(self) -> Dir {
        match self {
            Dir::East => Dir::North,
            Dir::North => Dir::West,
            Dir::West => Dir::South,
            Dir::South => Dir::East,
        }
    }

    /// Advance one unit from a `(y, x)` vertex key.
    fn step(self, (y, x): (u64, u64)) -> (u64, u64) {
        match self {
            Dir::East => (y, x + 1),
            Dir::South => (y + 1, x),
            Dir::West => (y, x - 1),
            Dir::North => (y - 1, x),
        }
    }
}

/// Directed boundary edges of one member pixel, with the pixel on the right.
fn pixel_edges(index: usize, width: usize, members: &HashSet<usize>) -> Vec<((u64, u64), Dir)> {
    let x = (index % width) as u64;
    let y = (index / width) as u64;
    let col = index % width;
    let has = |i: Option<usize>| i.is_some_and(|i| members.contains(&i));

    let mut edges = Vec::with_capacity(4);
    if !has(index.checked_sub(width)) {
        edges.push(((y, x), Dir::East));
    }
    if col + 1 >= width || !has(index.checked_add(1)) {
        edges.push(((y, x + 1), Dir::South));
    }
    if !has(index.checked_add(width)) {
        edges.push(((y + 1, x + 1), Dir::West));
    }
    if col == 0 || !has(index.checked_sub(1)) {
        edges.push(((y + 1, x), Dir::North));
    }
    edges
}

/// Remove the `dir` edge leaving `vertex`, if present.
fn take_edge(outgoing: &mut BTreeMap<(u64, u64), u8>, vertex: (u64, u64), dir: Dir) -> bool {
    let Some(bits) = outgoing.get_mut(&vertex) else {
        return false;
    };
    if *bits & dir.bit() == 0 {
        return false;
    }
    *bits &= !dir.bit();
    if *bits == 0 {
        outgoing.remove(&vertex);
    }
    true
}

/// Exact boundary contours of a pixel set on a grid of `width` columns.
///
/// Outer boundaries run clockwise on screen and holes counter-clockwise, so
/// the result fills correctly under both the nonzero and even-odd rules.
/// Where two member pixels touch only at a corner the walk turns right,
/// keeping them in separate contours. Members therefore connect through
/// edges only, and holes connect through corners as well: two holes that
/// touch at a corner come out as one self-touching contour that passes the
/// shared vertex twice. Contours are ordered by their top-left vertex and
/// each starts there.
pub fn trace_contours(indices: &[usize], width: u32) -> Result<Vec<Contour>, TraceError> {
    if indices.is_empty() {
        return Ok(Vec::new());
    }
    if width == 0 {
        return Err(TraceError::ZeroWidth);
    }
    let w = width as usize;

    let members: HashSet<usize> = indices.iter().copied().collect();
    let mut sorted: Vec<usize> = members.iter().copied().collect();
    sorted.par_sort_unstable();

    let edges: Vec<((u64, u64), Dir)> = sorted
        .par_iter()
        .flat_map_iter(|&i| pixel_edges(i, w, &members))
        .collect();

    // Outgoing edge headings keyed by (y, x) vertex.
    let mut outgoing: BTreeMap<(u64, u64), u8> = BTreeMap::new();
    for (vertex, dir) in edges {
        *outgoing.entry(vertex).or_insert(0) |= dir.bit();
    }

    let mut contours = Vec::new();
    loop {
        let Some((start, bits)) = outgoing.first_key_value().map(|(k, v)| (*k, *v)) else {
            break;
        };
        let Some(first) = [Dir::East, Dir::South, Dir::West, Dir::North]
            .into_iter()
            .find(|d| bits & d.bit() != 0)
        else {
            outgoing.remove(&start);
            continue;
        };

        let mut corners: Contour = vec![(start.1, start.0)];
        let mut dir = first;
        take_edge(&mut outgoing, start, dir);
        let mut pos = dir.step(start);

        while pos != start {
            let Some(next) = [dir.right(), dir, dir.left()]
                .into_iter()
                .find(|&d| take_edge(&mut outgoing, pos, d))
            else {
                crate::log_err!("trace_contours: open boundary at ({}, {})", pos.1, pos.0);
                break;
            };
            if next != dir {
                corners.push((pos.1, pos.0));
            }
            dir = next;
            pos = dir.step(pos);
        }
        contours.push(corners);
    }

    Ok(contours)
}

/// Format contours as SVG path data: `M x y`, then `H`/`V` runs, then `Z`.
pub fn contours_to_path(contours: &[Contour]) -> String {
    let mut out = String::new();
    for contour in contours {
        let Some(&(sx, sy)) = contour.first() else { continue };
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "M{} {}", sx, sy);
        let mut prev = (sx, sy);
        for &(x, y) in &contour[1..] {
            if y == prev.1 {
                let _ = write!(out, "H{}", x);
            } else {
                let _ = write!(out, "V{}", y);
            }
            prev = (x, y);
        }
        out.push('Z');
    }
    out
}

/// Vectorize a pixel cluster into one SVG path string.
///
/// The grid height is implied by the largest index. Duplicate indices are
/// ignored; the empty set yields an empty path.
pub fn trace_cluster(indices: &[usize], width: u32) -> Result<String, TraceError> {
    trace_contours(indices, width).map(|c| contours_to_path(&c))
}

/// [`trace_cluster`] on a canvas of known size, rejecting indices outside
/// `[0, width * height)`.
pub fn trace_cluster_bounded(indices: &[usize], width: u32, height: u32) -> Result<String, TraceError> {
    if !indices.is_empty() && width == 0 {
        return Err(TraceError::ZeroWidth);
    }
    let len = width as usize * height as usize;
    if let Some(&index) = indices.iter().find(|&&i| i >= len) {
        return Err(TraceError::IndexOutOfBounds { index, width, height });
    }
    trace_cluster(indices, width)
}
