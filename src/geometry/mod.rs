mod measures;

pub(crate) use measures::{
    collinear_overlap_length, crossing_boundary_segments, length_inside_polygon, point_distance,
    point_in_or_on_polygon, point_in_polygon, polygon_area, polyline_length,
    polyline_point_distance, ring_signed_area, shared_area,
};

use geo::{LineString, Point, Polygon};

use crate::element::Element;

/// Overlap measures at or below this threshold are treated as exactly zero
/// and produce no matrix entry.
pub(crate) const EPSILON: f64 = 1e-10;

/// View a one-vertex element as a point.
pub(crate) fn to_point(element: &Element) -> Point<f64> {
    let [x, y] = element.vertices()[0];
    Point::new(x, y)
}

/// View an element's vertex list as an open line string.
pub(crate) fn to_line_string(element: &Element) -> LineString<f64> {
    LineString::from(
        element.vertices().iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>(),
    )
}

/// View an element's vertex list as a polygon exterior ring (closed implicitly).
pub(crate) fn to_polygon(element: &Element) -> Polygon<f64> {
    Polygon::new(to_line_string(element), vec![])
}
