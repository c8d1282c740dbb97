//! Exact geometry tests behind the mapping-matrix builder.
//!
//! Area and length overlaps lean on `geo`'s boolean clipping; the point
//! containment and segment routines are hand-rolled where a fixed tie rule
//! is required so that boundary cases resolve the same way on every call.

use geo::coordinate_position::CoordPos;
use geo::{
    Area, BooleanOps, Coord, CoordinatePosition, EuclideanDistance, EuclideanLength, LineString,
    MultiLineString, Point, Polygon,
};

use super::EPSILON;

/// Euclidean distance between two points.
#[inline]
pub(crate) fn point_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    a.euclidean_distance(&b)
}

/// Nearest segment of `line` to `point`: `(segment index, distance)`.
///
/// Ties (a point equidistant from two segments, e.g. opposite a shared
/// vertex) resolve to the lowest segment index.
pub(crate) fn nearest_segment(line: &LineString<f64>, point: Point<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, segment) in line.lines().enumerate() {
        let d = point.euclidean_distance(&segment);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Perpendicular distance from `point` to the nearest segment of `line`.
#[inline]
pub(crate) fn polyline_point_distance(line: &LineString<f64>, point: Point<f64>) -> f64 {
    nearest_segment(line, point).1
}

/// Length of an open polyline.
#[inline]
pub(crate) fn polyline_length(line: &LineString<f64>) -> f64 {
    line.euclidean_length()
}

/// Unsigned area of a polygon.
#[inline]
pub(crate) fn polygon_area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Even-odd containment test with a fixed inclusive tie rule.
///
/// A horizontal sweep counts boundary segments whose crossing lies at or to
/// the right of the query point, using half-open vertical spans so a shared
/// vertex is never counted twice. A point exactly on a boundary crossing is
/// counted, which keeps the rule deterministic for points sitting on the
/// shared edge of two adjacent cells: the edge belongs to exactly one of them.
pub(crate) fn point_in_polygon(point: Point<f64>, polygon: &Polygon<f64>) -> bool {
    let (x, y) = (point.x(), point.y());
    let mut inside = false;
    for segment in polygon.exterior().lines() {
        let (x1, y1) = (segment.start.x, segment.start.y);
        let (x2, y2) = (segment.end.x, segment.end.y);
        let spans = (y1 <= y && y < y2) || (y2 <= y && y < y1);
        if !spans {
            continue;
        }
        let crossing = x1 + (y - y1) / (y2 - y1) * (x2 - x1);
        if x <= crossing {
            inside = !inside;
        }
    }
    inside
}

/// Containment test that also accepts every boundary point.
pub(crate) fn point_in_or_on_polygon(point: Point<f64>, polygon: &Polygon<f64>) -> bool {
    polygon.coordinate_position(&Coord { x: point.x(), y: point.y() }) != CoordPos::Outside
}

/// Length of the portion of `line` lying inside `polygon`.
pub(crate) fn length_inside_polygon(line: &LineString<f64>, polygon: &Polygon<f64>) -> f64 {
    let clipped = polygon.clip(&MultiLineString::new(vec![line.clone()]), false);
    clipped.euclidean_length()
}

/// Area of the intersection region of two polygons (convex or not).
pub(crate) fn shared_area(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    a.intersection(b).unsigned_area()
}

/// Overlap of two polylines measured along their shared arc-length
/// parameterization: the summed length of collinear segment portions.
pub(crate) fn collinear_overlap_length(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    let mut total = 0.0;
    for sa in a.lines() {
        let dx = sa.end.x - sa.start.x;
        let dy = sa.end.y - sa.start.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            continue;
        }
        let len = len_sq.sqrt();
        for sb in b.lines() {
            let off1 = cross(dx, dy, sb.start.x - sa.start.x, sb.start.y - sa.start.y);
            let off2 = cross(dx, dy, sb.end.x - sa.start.x, sb.end.y - sa.start.y);
            if off1.abs() > EPSILON * len || off2.abs() > EPSILON * len {
                continue;
            }
            // Arc-length parameters of sb's endpoints along sa, clamped to it.
            let t1 = ((sb.start.x - sa.start.x) * dx + (sb.start.y - sa.start.y) * dy) / len_sq;
            let t2 = ((sb.end.x - sa.start.x) * dx + (sb.end.y - sa.start.y) * dy) / len_sq;
            let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let overlap = hi.min(1.0) - lo.max(0.0);
            if overlap > 0.0 {
                total += overlap * len;
            }
        }
    }
    total
}

/// Signed area of an open vertex ring (positive for counter-clockwise order).
pub(crate) fn ring_signed_area(vertices: &[[f64; 2]]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let [x1, y1] = vertices[i];
        let [x2, y2] = vertices[(i + 1) % n];
        twice_area += x1 * y2 - x2 * y1;
    }
    0.5 * twice_area
}

/// First pair of non-adjacent boundary segments that properly cross, if any.
pub(crate) fn crossing_boundary_segments(vertices: &[[f64; 2]]) -> Option<(usize, usize)> {
    let n = vertices.len();
    for i in 0..n {
        for j in 0..i {
            // Adjacent segments share a vertex; skip them (including the
            // first/last wrap-around pair).
            if i - j == 1 || (j == 0 && i == n - 1) {
                continue;
            }
            let a = (vertices[i], vertices[(i + 1) % n]);
            let b = (vertices[j], vertices[(j + 1) % n]);
            if segments_properly_cross(a, b) {
                return Some((j, i));
            }
        }
    }
    None
}

/// Strict crossing test: both segments straddle each other's carrier line.
fn segments_properly_cross(a: ([f64; 2], [f64; 2]), b: ([f64; 2], [f64; 2])) -> bool {
    let d1 = orient(b.0, b.1, a.0);
    let d2 = orient(b.0, b.1, a.1);
    let d3 = orient(a.0, a.1, b.0);
    let d4 = orient(a.0, a.1, b.1);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

#[inline]
fn orient(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> f64 {
    cross(q[0] - p[0], q[1] - p[1], r[0] - p[0], r[1] - p[1])
}

#[inline]
fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}
