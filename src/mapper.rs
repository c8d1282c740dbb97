//! The mapping engine: builds a sparse weight matrix between two element
//! sets and applies it to time-indexed values.
//!
//! A matrix row corresponds to one target element, a column to one source
//! element. Rows are built independently, so a target without any covering
//! source simply keeps an empty row and maps to zero.

use anyhow::{Result, bail};
use rstar::AABB;
use smallvec::SmallVec;

use crate::element::{ElementKind, ElementSet};
use crate::error::MappingError;
use crate::geometry::{self, EPSILON};
use crate::matrix::MappingMatrix;
use crate::method::{self, Method};
use crate::search::{SearchStrategy, SearchTree, element_extent};
use crate::values::ValueSet;

/// Below this many elements on either side, `Auto` skips the search tree:
/// the index build costs more than the scan it saves.
const AUTO_TREE_THRESHOLD: usize = 10;

/// Maps values between two element sets through a precomputed weight matrix.
///
/// Call [`initialise`](Self::initialise) once per (method, source, target)
/// combination, then [`map_values`](Self::map_values) for every time step
/// batch. Re-initialising replaces the matrix wholesale; a failed
/// initialisation leaves the previous matrix untouched.
#[derive(Debug, Default)]
pub struct ElementMapper {
    method: Option<Method>,
    matrix: MappingMatrix,
    strategy: SearchStrategy,
}

impl ElementMapper {
    /// A mapper with the default [`SearchStrategy::Auto`] candidate lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapper with an explicit candidate-lookup strategy.
    pub fn with_strategy(strategy: SearchStrategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    /// Change the candidate-lookup strategy for subsequent initialisations.
    pub fn set_strategy(&mut self, strategy: SearchStrategy) {
        self.strategy = strategy;
    }

    #[inline] pub fn strategy(&self) -> SearchStrategy { self.strategy }

    /// The method of the last successful initialisation, if any.
    #[inline] pub fn method(&self) -> Option<Method> { self.method }

    #[inline] pub fn is_initialised(&self) -> bool { self.method.is_some() }

    /// The current mapping matrix.
    pub fn matrix(&self) -> &MappingMatrix {
        &self.matrix
    }

    /// Validate both element sets and build the weight matrix for `method`.
    ///
    /// Fails without touching the current matrix when the method is not
    /// defined for the geometry pair or when either set violates its shape
    /// rules.
    pub fn initialise(
        &mut self,
        method: Method,
        source: &ElementSet,
        target: &ElementSet,
    ) -> Result<()> {
        if !method::is_supported(method, source.kind(), target.kind()) {
            return Err(unsupported(method, source, target));
        }
        source.validate()?;
        target.validate()?;
        self.matrix = self.build_matrix(method, source, target)?;
        self.method = Some(method);
        Ok(())
    }

    /// Apply the matrix to one value set, producing target values for every
    /// time step.
    pub fn map_values(&self, values: &ValueSet) -> Result<ValueSet> {
        if self.method.is_none() {
            return Err(MappingError::NotInitialised.into());
        }
        if values.element_count() != self.matrix.column_count() {
            return Err(MappingError::SizeMismatch {
                expected: self.matrix.column_count(),
                actual: values.element_count(),
            }
            .into());
        }
        let mut mapped = ValueSet::zeros(values.time_count(), self.matrix.row_count());
        for time in 0..values.time_count() {
            for row in 0..self.matrix.row_count() {
                let mut sum = 0.0;
                for &(column, weight) in self.matrix.row(row) {
                    sum += weight * values.value(time, column as usize);
                }
                mapped.set_value(time, row, sum);
            }
        }
        Ok(mapped)
    }

    /// Weight of the matrix cell `(row, column)`.
    pub fn mapping_weight(&self, row: usize, column: usize) -> Result<f64> {
        if self.method.is_none() {
            return Err(MappingError::NotInitialised.into());
        }
        if row >= self.matrix.row_count() || column >= self.matrix.column_count() {
            bail!(
                "matrix index ({row}, {column}) out of bounds for {}x{} matrix",
                self.matrix.row_count(),
                self.matrix.column_count()
            );
        }
        Ok(self.matrix.value(row, column))
    }

    fn build_matrix(
        &self,
        method: Method,
        source: &ElementSet,
        target: &ElementSet,
    ) -> Result<MappingMatrix> {
        let tree = self.build_tree(method, source, target);
        let tree = tree.as_ref();
        match (source.kind().base(), target.kind().base()) {
            (ElementKind::Point, ElementKind::Point) => {
                point_to_point(method, source, target, tree)
            }
            (ElementKind::Point, ElementKind::PolyLine) => {
                point_to_polyline(method, source, target)
            }
            (ElementKind::Point, ElementKind::Polygon) => {
                point_to_polygon(method, source, target, tree)
            }
            (ElementKind::PolyLine, ElementKind::Point) => {
                polyline_to_point(method, source, target)
            }
            (ElementKind::PolyLine, ElementKind::PolyLine) => {
                polyline_to_polyline(method, source, target, tree)
            }
            (ElementKind::PolyLine, ElementKind::Polygon) => {
                polyline_to_polygon(method, source, target, tree)
            }
            (ElementKind::Polygon, ElementKind::Point) => {
                polygon_to_point(method, source, target, tree)
            }
            (ElementKind::Polygon, ElementKind::PolyLine) => {
                polygon_to_polyline(method, source, target, tree)
            }
            (ElementKind::Polygon, ElementKind::Polygon) => {
                polygon_to_polygon(method, source, target, tree)
            }
            _ => Err(unsupported(method, source, target)),
        }
    }

    /// Build a source-side search tree when the method can cull by bounding
    /// box. Distance methods always scan every source element, so a tree
    /// would change nothing for them.
    fn build_tree(
        &self,
        method: Method,
        source: &ElementSet,
        target: &ElementSet,
    ) -> Option<SearchTree> {
        if matches!(method, Method::Nearest | Method::Inverse) {
            return None;
        }
        let use_tree = match self.strategy {
            SearchStrategy::SearchTree => true,
            SearchStrategy::BruteForce => false,
            SearchStrategy::Auto => {
                source.len() > AUTO_TREE_THRESHOLD && target.len() > AUTO_TREE_THRESHOLD
            }
        };
        use_tree.then(|| SearchTree::build(source))
    }
}

fn unsupported(method: Method, source: &ElementSet, target: &ElementSet) -> anyhow::Error {
    MappingError::UnsupportedMapping { method, from: source.kind(), to: target.kind() }.into()
}

/// Source indices to test against a target extent: the tree's hits, or the
/// full index range when no tree is in play. Both come back in ascending
/// order, which keeps matrix rows identical across strategies.
fn candidates(
    tree: Option<&SearchTree>,
    extent: &AABB<[f64; 2]>,
    source_len: usize,
) -> SmallVec<[usize; 16]> {
    match tree {
        Some(tree) => tree.query(extent),
        None => (0..source_len).collect(),
    }
}

/// Split the unit weight equally over the minimum-distance sources.
fn nearest_weights(distances: &[f64]) -> Vec<(usize, f64)> {
    let mut min = f64::INFINITY;
    for &d in distances {
        if d < min {
            min = d;
        }
    }
    let hits: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == min)
        .map(|(i, _)| i)
        .collect();
    if hits.is_empty() {
        return Vec::new();
    }
    let share = 1.0 / hits.len() as f64;
    hits.into_iter().map(|i| (i, share)).collect()
}

/// Normalised inverse-distance weights. A source at (effectively) zero
/// distance would blow up the reciprocal, so coincident sources take the
/// whole weight between them instead.
fn inverse_weights(distances: &[f64]) -> Vec<(usize, f64)> {
    if distances.iter().any(|&d| d <= EPSILON) {
        let hits: Vec<usize> = distances
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d <= EPSILON)
            .map(|(i, _)| i)
            .collect();
        let share = 1.0 / hits.len() as f64;
        return hits.into_iter().map(|i| (i, share)).collect();
    }
    let total: f64 = distances.iter().map(|d| 1.0 / d).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    distances.iter().enumerate().map(|(i, d)| (i, (1.0 / d) / total)).collect()
}

/// Scale the row so its entries sum to one; an empty row stays empty.
fn normalize_row(matrix: &mut MappingMatrix, row: usize) {
    let total = matrix.row_sum(row);
    if total > 0.0 {
        matrix.scale_row(row, 1.0 / total);
    }
}

fn point_to_point(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let point = geometry::to_point(element);
        match method {
            Method::Nearest | Method::Inverse => {
                let distances: Vec<f64> = source
                    .elements()
                    .iter()
                    .map(|s| geometry::point_distance(geometry::to_point(s), point))
                    .collect();
                let weights = match method {
                    Method::Nearest => nearest_weights(&distances),
                    _ => inverse_weights(&distances),
                };
                for (column, weight) in weights {
                    matrix.set(row, column, weight);
                }
            }
            Method::Sum => {
                for column in candidates(tree, &element_extent(element), source.len()) {
                    let s = geometry::to_point(source.element(column));
                    if geometry::point_distance(s, point) <= EPSILON {
                        matrix.set(row, column, 1.0);
                    }
                }
            }
            _ => return Err(unsupported(method, source, target)),
        }
    }
    Ok(matrix)
}

fn point_to_polyline(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let line = geometry::to_line_string(element);
        let distances: Vec<f64> = source
            .elements()
            .iter()
            .map(|s| geometry::polyline_point_distance(&line, geometry::to_point(s)))
            .collect();
        let weights = match method {
            Method::Nearest => nearest_weights(&distances),
            Method::Inverse => inverse_weights(&distances),
            _ => return Err(unsupported(method, source, target)),
        };
        for (column, weight) in weights {
            matrix.set(row, column, weight);
        }
    }
    Ok(matrix)
}

fn point_to_polygon(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let polygon = geometry::to_polygon(element);
        let hits: Vec<usize> = candidates(tree, &element_extent(element), source.len())
            .into_iter()
            .filter(|&i| geometry::point_in_polygon(geometry::to_point(source.element(i)), &polygon))
            .collect();
        match method {
            Method::Mean => {
                let share = 1.0 / hits.len() as f64;
                for column in hits {
                    matrix.set(row, column, share);
                }
            }
            Method::Sum => {
                for column in hits {
                    matrix.set(row, column, 1.0);
                }
            }
            _ => return Err(unsupported(method, source, target)),
        }
    }
    Ok(matrix)
}

fn polyline_to_point(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let point = geometry::to_point(element);
        let distances: Vec<f64> = source
            .elements()
            .iter()
            .map(|s| geometry::polyline_point_distance(&geometry::to_line_string(s), point))
            .collect();
        let weights = match method {
            Method::Nearest => nearest_weights(&distances),
            Method::Inverse => inverse_weights(&distances),
            _ => return Err(unsupported(method, source, target)),
        };
        for (column, weight) in weights {
            matrix.set(row, column, weight);
        }
    }
    Ok(matrix)
}

fn polyline_to_polyline(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let line = geometry::to_line_string(element);
        for column in candidates(tree, &element_extent(element), source.len()) {
            let source_line = geometry::to_line_string(source.element(column));
            let overlap = geometry::collinear_overlap_length(&source_line, &line);
            if overlap <= EPSILON {
                continue;
            }
            match method {
                Method::WeightedMean => matrix.set(row, column, overlap),
                Method::WeightedSum => {
                    matrix.set(row, column, overlap / geometry::polyline_length(&source_line));
                }
                _ => return Err(unsupported(method, source, target)),
            }
        }
        if method == Method::WeightedMean {
            normalize_row(&mut matrix, row);
        }
    }
    Ok(matrix)
}

fn polyline_to_polygon(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let polygon = geometry::to_polygon(element);
        for column in candidates(tree, &element_extent(element), source.len()) {
            let line = geometry::to_line_string(source.element(column));
            let inside = geometry::length_inside_polygon(&line, &polygon);
            if inside <= EPSILON {
                continue;
            }
            match method {
                Method::WeightedMean => matrix.set(row, column, inside),
                Method::WeightedSum => {
                    matrix.set(row, column, inside / geometry::polyline_length(&line));
                }
                _ => return Err(unsupported(method, source, target)),
            }
        }
        if method == Method::WeightedMean {
            normalize_row(&mut matrix, row);
        }
    }
    Ok(matrix)
}

fn polygon_to_point(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    if method != Method::Value {
        return Err(unsupported(method, source, target));
    }
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let point = geometry::to_point(element);
        let nearby = candidates(tree, &element_extent(element), source.len());
        let mut hits: Vec<usize> = nearby
            .iter()
            .copied()
            .filter(|&i| {
                geometry::point_in_polygon(point, &geometry::to_polygon(source.element(i)))
            })
            .collect();
        if hits.is_empty() {
            // The tie rule assigns edge points to one cell, but a point on
            // the outer boundary of the whole source set can still miss
            // every strict test; fall back to boundary-inclusive containment.
            hits = nearby
                .iter()
                .copied()
                .filter(|&i| {
                    geometry::point_in_or_on_polygon(point, &geometry::to_polygon(source.element(i)))
                })
                .collect();
        }
        if hits.is_empty() {
            continue;
        }
        let share = 1.0 / hits.len() as f64;
        for column in hits {
            matrix.set(row, column, share);
        }
    }
    Ok(matrix)
}

fn polygon_to_polyline(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let line = geometry::to_line_string(element);
        let length = geometry::polyline_length(&line);
        for column in candidates(tree, &element_extent(element), source.len()) {
            let polygon = geometry::to_polygon(source.element(column));
            let inside = geometry::length_inside_polygon(&line, &polygon);
            if inside <= EPSILON {
                continue;
            }
            match method {
                Method::WeightedMean => matrix.set(row, column, inside),
                Method::WeightedSum => matrix.set(row, column, inside / length),
                _ => return Err(unsupported(method, source, target)),
            }
        }
        if method == Method::WeightedMean {
            normalize_row(&mut matrix, row);
        }
    }
    Ok(matrix)
}

fn polygon_to_polygon(
    method: Method,
    source: &ElementSet,
    target: &ElementSet,
    tree: Option<&SearchTree>,
) -> Result<MappingMatrix> {
    let mut matrix = MappingMatrix::new(target.len(), source.len());
    for (row, element) in target.elements().iter().enumerate() {
        let polygon = geometry::to_polygon(element);
        let area = geometry::polygon_area(&polygon);
        for column in candidates(tree, &element_extent(element), source.len()) {
            let source_polygon = geometry::to_polygon(source.element(column));
            let shared = geometry::shared_area(&source_polygon, &polygon);
            if shared <= EPSILON {
                continue;
            }
            match method {
                Method::WeightedMean => matrix.set(row, column, shared),
                Method::WeightedSum => matrix.set(row, column, shared / area),
                Method::Distribute => {
                    matrix.set(row, column, shared / geometry::polygon_area(&source_polygon));
                }
                _ => return Err(unsupported(method, source, target)),
            }
        }
        if method == Method::WeightedMean {
            normalize_row(&mut matrix, row);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::element::Element;

    const TOLERANCE: f64 = 1e-9;

    fn point_set(id: &str, coords: &[(f64, f64)]) -> ElementSet {
        let elements = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Element::with_vertices(format!("{id}-{i}"), vec![[x, y]]))
            .collect();
        ElementSet::new(id, ElementKind::Point, elements)
    }

    fn line_set(id: &str, lines: &[&[(f64, f64)]]) -> ElementSet {
        let elements = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                Element::with_vertices(
                    format!("{id}-{i}"),
                    line.iter().map(|&(x, y)| [x, y]).collect(),
                )
            })
            .collect();
        ElementSet::new(id, ElementKind::PolyLine, elements)
    }

    fn polygon_set(id: &str, rings: &[&[(f64, f64)]]) -> ElementSet {
        let elements = rings
            .iter()
            .enumerate()
            .map(|(i, ring)| {
                Element::with_vertices(
                    format!("{id}-{i}"),
                    ring.iter().map(|&(x, y)| [x, y]).collect(),
                )
            })
            .collect();
        ElementSet::new(id, ElementKind::Polygon, elements)
    }

    /// Unit corners of a square measuring grid: four points spanning 100x100.
    fn four_corner_points() -> ElementSet {
        point_set("corners", &[(0.0, 100.0), (0.0, 0.0), (100.0, 0.0), (100.0, 100.0)])
    }

    fn two_probe_points() -> ElementSet {
        point_set("probes", &[(0.0, 75.0), (200.0, 50.0)])
    }

    /// Two vertical line segments sharing their lower endpoint on the y axis.
    fn two_vertical_lines() -> ElementSet {
        line_set("lines", &[&[(0.0, 20.0), (0.0, 0.0)], &[(0.0, 10.0), (0.0, 0.0)]])
    }

    fn four_probe_points() -> ElementSet {
        point_set("probes", &[(0.0, 15.0), (5.0, 15.0), (0.0, 10.0), (10.0, 10.0)])
    }

    /// Three 10x10 cells in an L arrangement: two on top, one below the left.
    fn three_square_grid() -> ElementSet {
        polygon_set(
            "grid",
            &[
                &[(0.0, 20.0), (0.0, 10.0), (10.0, 10.0), (10.0, 20.0)],
                &[(10.0, 20.0), (10.0, 10.0), (20.0, 10.0), (20.0, 20.0)],
                &[(0.0, 10.0), (0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
            ],
        )
    }

    fn grid_probe_points() -> ElementSet {
        point_set("probes", &[(5.0, 15.0), (10.0, 15.0), (15.0, 15.0), (15.0, 5.0)])
    }

    fn two_square_cells() -> ElementSet {
        polygon_set(
            "cells",
            &[
                &[(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)],
                &[(3.0, 1.0), (5.0, 1.0), (5.0, 3.0), (3.0, 3.0)],
            ],
        )
    }

    fn two_channel_lines() -> ElementSet {
        line_set("channels", &[&[(0.0, 2.5), (2.0, 2.5)], &[(2.0, 2.5), (4.0, 1.5)]])
    }

    #[test]
    fn nearest_point_to_point_splits_ties() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Nearest, &four_corner_points(), &two_probe_points()).unwrap();
        let matrix = mapper.matrix();

        assert_eq!(matrix.value(0, 0), 1.0);
        assert!((matrix.row_sum(0) - 1.0).abs() < TOLERANCE);
        // The second probe is equidistant from the two right-hand corners.
        assert_eq!(matrix.value(1, 2), 0.5);
        assert_eq!(matrix.value(1, 3), 0.5);
        assert!((matrix.row_sum(1) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn inverse_point_to_point_normalizes_reciprocal_distances() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Inverse, &four_corner_points(), &two_probe_points()).unwrap();
        let matrix = mapper.matrix();

        assert!((matrix.value(0, 0) - 0.56310461156889).abs() < TOLERANCE);
        assert!((matrix.row_sum(0) - 1.0).abs() < TOLERANCE);
        assert!((matrix.row_sum(1) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn sum_point_to_point_matches_coincident_points() {
        let source = point_set("s", &[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        let target = point_set("t", &[(0.0, 0.0), (5.0, 5.0)]);
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Sum, &source, &target).unwrap();
        let matrix = mapper.matrix();

        assert_eq!(matrix.value(0, 0), 1.0);
        assert_eq!(matrix.value(0, 1), 0.0);
        assert_eq!(matrix.value(0, 2), 1.0);
        assert!(!matrix.has_coverage(1));
    }

    #[test]
    fn nearest_point_to_polyline() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Nearest, &four_probe_points(), &two_vertical_lines()).unwrap();
        let matrix = mapper.matrix();

        // Two of the probes sit directly on the long line.
        assert_eq!(matrix.value(0, 0), 0.5);
        assert_eq!(matrix.value(0, 1), 0.0);
        assert_eq!(matrix.value(0, 2), 0.5);
        assert_eq!(matrix.value(0, 3), 0.0);
        // Only (0, 10) touches the short line.
        assert_eq!(matrix.value(1, 0), 0.0);
        assert_eq!(matrix.value(1, 1), 0.0);
        assert_eq!(matrix.value(1, 2), 1.0);
        assert_eq!(matrix.value(1, 3), 0.0);
    }

    #[test]
    fn nearest_polyline_to_point() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Nearest, &two_vertical_lines(), &four_probe_points()).unwrap();
        let matrix = mapper.matrix();

        assert_eq!(matrix.value(0, 0), 1.0);
        assert_eq!(matrix.value(0, 1), 0.0);
        assert_eq!(matrix.value(1, 0), 1.0);
        assert_eq!(matrix.value(1, 1), 0.0);
        // (0, 10) lies on both lines, (10, 10) is 10 away from both.
        assert_eq!(matrix.value(2, 0), 0.5);
        assert_eq!(matrix.value(2, 1), 0.5);
        assert_eq!(matrix.value(3, 0), 0.5);
        assert_eq!(matrix.value(3, 1), 0.5);
    }

    #[test]
    fn inverse_polyline_to_point() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Inverse, &two_vertical_lines(), &four_probe_points()).unwrap();
        let matrix = mapper.matrix();

        // A zero-distance line takes the whole weight.
        assert_eq!(matrix.value(0, 0), 1.0);
        assert_eq!(matrix.value(0, 1), 0.0);
        // Distances 5 and sqrt(50) from (5, 15).
        assert!((matrix.value(1, 0) - 0.585786437626905).abs() < TOLERANCE);
        assert!((matrix.row_sum(1) - 1.0).abs() < TOLERANCE);
        assert_eq!(matrix.value(2, 0), 0.5);
        assert_eq!(matrix.value(2, 1), 0.5);
        assert_eq!(matrix.value(3, 0), 0.5);
        assert_eq!(matrix.value(3, 1), 0.5);
    }

    #[test]
    fn mean_point_to_polygon_uses_containment_tie_rule() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();
        let matrix = mapper.matrix();

        // (10, 15) sits on the shared edge and counts for the left cell only.
        assert_eq!(matrix.value(0, 0), 0.5);
        assert_eq!(matrix.value(0, 1), 0.5);
        assert_eq!(matrix.value(0, 2), 0.0);
        assert_eq!(matrix.value(0, 3), 0.0);
        assert_eq!(matrix.value(1, 0), 0.0);
        assert_eq!(matrix.value(1, 1), 0.0);
        assert_eq!(matrix.value(1, 2), 1.0);
        assert_eq!(matrix.value(1, 3), 0.0);
        // The lower cell contains no probe at all.
        assert!(!matrix.has_coverage(2));
    }

    #[test]
    fn value_polygon_to_point() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Value, &three_square_grid(), &grid_probe_points()).unwrap();
        let matrix = mapper.matrix();

        assert_eq!(matrix.value(0, 0), 1.0);
        assert_eq!(matrix.value(1, 0), 1.0);
        assert_eq!(matrix.value(1, 1), 0.0);
        assert_eq!(matrix.value(2, 1), 1.0);
        // (15, 5) lies outside every cell.
        assert!(!matrix.has_coverage(3));
    }

    #[test]
    fn weighted_mean_polyline_to_polygon() {
        let mut mapper = ElementMapper::new();
        mapper
            .initialise(Method::WeightedMean, &two_channel_lines(), &two_square_cells())
            .unwrap();
        let matrix = mapper.matrix();

        let expected = 1.0 / (1.0 + 1.25_f64.sqrt());
        assert!((matrix.value(0, 0) - expected).abs() < TOLERANCE);
        assert!((matrix.value(0, 1) - (1.0 - expected)).abs() < TOLERANCE);
        assert_eq!(matrix.value(1, 0), 0.0);
        assert!((matrix.value(1, 1) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn weighted_sum_polyline_to_polygon() {
        let mut mapper = ElementMapper::new();
        mapper
            .initialise(Method::WeightedSum, &two_channel_lines(), &two_square_cells())
            .unwrap();
        let matrix = mapper.matrix();

        assert!((matrix.value(0, 0) - 0.5).abs() < TOLERANCE);
        assert!((matrix.value(0, 1) - 0.5).abs() < TOLERANCE);
        assert_eq!(matrix.value(1, 0), 0.0);
        assert!((matrix.value(1, 1) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn weighted_mean_polygon_to_polyline() {
        let mut mapper = ElementMapper::new();
        mapper
            .initialise(Method::WeightedMean, &two_square_cells(), &two_channel_lines())
            .unwrap();
        let matrix = mapper.matrix();

        assert!((matrix.value(0, 0) - 1.0).abs() < TOLERANCE);
        assert_eq!(matrix.value(0, 1), 0.0);
        assert!((matrix.value(1, 0) - 0.5).abs() < TOLERANCE);
        assert!((matrix.value(1, 1) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn weighted_sum_polygon_to_polyline() {
        let mut mapper = ElementMapper::new();
        mapper
            .initialise(Method::WeightedSum, &two_square_cells(), &two_channel_lines())
            .unwrap();
        let matrix = mapper.matrix();

        assert!((matrix.value(0, 0) - 0.5).abs() < TOLERANCE);
        assert_eq!(matrix.value(0, 1), 0.0);
        assert!((matrix.value(1, 0) - 0.5).abs() < TOLERANCE);
        assert!((matrix.value(1, 1) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn weighted_mean_polygon_to_polygon() {
        let squares = polygon_set(
            "squares",
            &[
                &[(0.0, 10.0), (0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
                &[(10.0, 10.0), (10.0, 0.0), (20.0, 0.0), (20.0, 10.0)],
            ],
        );
        let triangle = polygon_set("tri", &[&[(5.0, 9.0), (5.0, 1.0), (15.0, 5.0)]]);
        let mut mapper = ElementMapper::new();

        // Each square receives the full triangle value.
        mapper.initialise(Method::WeightedMean, &triangle, &squares).unwrap();
        assert!((mapper.matrix().value(0, 0) - 1.0).abs() < TOLERANCE);
        assert!((mapper.matrix().value(1, 0) - 1.0).abs() < TOLERANCE);

        // The triangle area splits 30 to 10 between the squares.
        mapper.initialise(Method::WeightedMean, &squares, &triangle).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.75).abs() < TOLERANCE);
        assert!((mapper.matrix().value(0, 1) - 0.25).abs() < TOLERANCE);
    }

    #[test]
    fn weighted_sum_polygon_to_polygon() {
        let squares = polygon_set(
            "squares",
            &[
                &[(0.0, 10.0), (0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
                &[(10.0, 10.0), (10.0, 0.0), (20.0, 0.0), (20.0, 10.0)],
            ],
        );
        let triangle = polygon_set("tri", &[&[(5.0, 9.0), (5.0, 1.0), (15.0, 5.0)]]);
        let mut mapper = ElementMapper::new();

        // Overlap areas 30 and 10 over square areas of 100.
        mapper.initialise(Method::WeightedSum, &triangle, &squares).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.3).abs() < TOLERANCE);
        assert!((mapper.matrix().value(1, 0) - 0.1).abs() < TOLERANCE);

        // Same overlaps over the triangle area of 40.
        mapper.initialise(Method::WeightedSum, &squares, &triangle).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.75).abs() < TOLERANCE);
        assert!((mapper.matrix().value(0, 1) - 0.25).abs() < TOLERANCE);
    }

    #[test]
    fn overlapping_triangles() {
        let left = polygon_set("left", &[&[(0.0, 2.0), (0.0, 0.0), (2.0, 0.0)]]);
        let right = polygon_set("right", &[&[(1.0, 2.0), (1.0, 0.0), (3.0, 0.0)]]);
        let skew = polygon_set("skew", &[&[(1.0, 2.0), (1.0, 0.0), (3.0, 2.0)]]);
        let mut mapper = ElementMapper::new();

        mapper.initialise(Method::WeightedMean, &left, &right).unwrap();
        assert!((mapper.matrix().value(0, 0) - 1.0).abs() < TOLERANCE);
        mapper.initialise(Method::WeightedMean, &right, &left).unwrap();
        assert!((mapper.matrix().value(0, 0) - 1.0).abs() < TOLERANCE);

        // Shared area 0.5 over triangle areas of 2.
        mapper.initialise(Method::WeightedSum, &left, &right).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.25).abs() < TOLERANCE);
        mapper.initialise(Method::WeightedSum, &right, &left).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.25).abs() < TOLERANCE);

        // Shared area 0.25 against the skewed triangle.
        mapper.initialise(Method::WeightedSum, &left, &skew).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.125).abs() < TOLERANCE);
        mapper.initialise(Method::WeightedSum, &skew, &left).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.125).abs() < TOLERANCE);
    }

    #[test]
    fn distribute_spreads_source_fractions() {
        let big = polygon_set("big", &[&[(0.0, 0.0), (20.0, 0.0), (20.0, 10.0), (0.0, 10.0)]]);
        let halves = polygon_set(
            "halves",
            &[
                &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
                &[(10.0, 0.0), (20.0, 0.0), (20.0, 10.0), (10.0, 10.0)],
            ],
        );
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Distribute, &big, &halves).unwrap();

        // Each half receives half of the source polygon.
        assert!((mapper.matrix().value(0, 0) - 0.5).abs() < TOLERANCE);
        assert!((mapper.matrix().value(1, 0) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn collinear_polyline_to_polyline() {
        let source = line_set("s", &[&[(0.0, 0.0), (10.0, 0.0)]]);
        let target = line_set("t", &[&[(4.0, 0.0), (14.0, 0.0)], &[(0.0, 1.0), (10.0, 1.0)]]);
        let mut mapper = ElementMapper::new();

        mapper.initialise(Method::WeightedMean, &source, &target).unwrap();
        assert!((mapper.matrix().value(0, 0) - 1.0).abs() < TOLERANCE);
        assert!(!mapper.matrix().has_coverage(1));

        // Six of the source's ten units lie under the first target line.
        mapper.initialise(Method::WeightedSum, &source, &target).unwrap();
        assert!((mapper.matrix().value(0, 0) - 0.6).abs() < TOLERANCE);
    }

    #[test]
    fn map_values_through_grid_and_back() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();

        let probe_values = ValueSet::from_rows(vec![vec![0.0, 10.0, 20.0, 30.0]]).unwrap();
        let grid_values = mapper.map_values(&probe_values).unwrap();
        assert_eq!(grid_values.values_at(0).to_vec(), vec![5.0, 20.0, 0.0]);

        mapper.initialise(Method::Value, &three_square_grid(), &grid_probe_points()).unwrap();
        let back = mapper.map_values(&grid_values).unwrap();
        assert_eq!(back.values_at(0).to_vec(), vec![5.0, 5.0, 20.0, 0.0]);
    }

    #[test]
    fn map_values_handles_multiple_time_steps() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();

        let values =
            ValueSet::from_rows(vec![vec![0.0, 10.0, 20.0, 30.0], vec![2.0, 4.0, 6.0, 8.0]])
                .unwrap();
        let mapped = mapper.map_values(&values).unwrap();
        assert_eq!(mapped.time_count(), 2);
        assert_eq!(mapped.values_at(1).to_vec(), vec![3.0, 6.0, 0.0]);
    }

    #[test]
    fn reinitialise_replaces_the_matrix() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Nearest, &four_corner_points(), &two_probe_points()).unwrap();
        assert_eq!(mapper.matrix().column_count(), 4);

        mapper.initialise(Method::Nearest, &two_vertical_lines(), &four_probe_points()).unwrap();
        assert_eq!(mapper.matrix().row_count(), 4);
        assert_eq!(mapper.matrix().column_count(), 2);
        assert_eq!(mapper.method(), Some(Method::Nearest));
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let mut mapper = ElementMapper::new();
        let err = mapper
            .initialise(Method::Distribute, &four_corner_points(), &two_probe_points())
            .unwrap_err();
        match err.downcast_ref::<MappingError>() {
            Some(MappingError::UnsupportedMapping { method: Method::Distribute, .. }) => {}
            other => panic!("expected UnsupportedMapping, got {other:?}"),
        }
        assert!(!mapper.is_initialised());
    }

    #[test]
    fn invalid_geometry_fails_before_any_matrix_state() {
        let bad = ElementSet::new(
            "bad",
            ElementKind::Point,
            vec![Element::with_vertices("e1", vec![[1.0, 1.0], [2.0, 2.0]])],
        );
        let mut mapper = ElementMapper::new();
        let err = mapper.initialise(Method::Nearest, &bad, &two_probe_points()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MappingError>(),
            Some(MappingError::InvalidGeometry { .. })
        ));
        assert!(!mapper.is_initialised());
        assert!(mapper.map_values(&ValueSet::from_rows(vec![vec![1.0]]).unwrap()).is_err());
    }

    #[test]
    fn size_mismatch_leaves_the_matrix_intact() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();

        let wrong = ValueSet::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let err = mapper.map_values(&wrong).unwrap_err();
        match err.downcast_ref::<MappingError>() {
            Some(MappingError::SizeMismatch { expected: 4, actual: 2 }) => {}
            other => panic!("expected SizeMismatch, got {other:?}"),
        }

        // The mapper is still usable with correctly sized input.
        let values = ValueSet::from_rows(vec![vec![0.0, 10.0, 20.0, 30.0]]).unwrap();
        assert!(mapper.map_values(&values).is_ok());
    }

    #[test]
    fn uninitialised_mapper_reports_not_initialised() {
        let mapper = ElementMapper::new();
        let err = mapper.map_values(&ValueSet::from_rows(vec![vec![1.0]]).unwrap()).unwrap_err();
        assert!(matches!(err.downcast_ref::<MappingError>(), Some(MappingError::NotInitialised)));
        assert!(mapper.mapping_weight(0, 0).is_err());
    }

    #[test]
    fn mapping_weight_checks_bounds() {
        let mut mapper = ElementMapper::new();
        mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();
        assert_eq!(mapper.mapping_weight(0, 0).unwrap(), 0.5);
        assert!(mapper.mapping_weight(3, 0).is_err());
        assert!(mapper.mapping_weight(0, 4).is_err());
    }

    fn square_grid(rows: usize, cols: usize, size: f64) -> ElementSet {
        let mut elements = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let (x0, y0) = (c as f64 * size, r as f64 * size);
                elements.push(Element::with_vertices(
                    format!("cell-{r}-{c}"),
                    vec![[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size]],
                ));
            }
        }
        ElementSet::new("grid", ElementKind::Polygon, elements)
    }

    proptest! {
        #[test]
        fn tree_and_brute_force_build_identical_matrices(
            coords in prop::collection::vec((0.0..40.0f64, 0.0..40.0f64), 12..30),
        ) {
            let points = point_set("p", &coords);
            let grid = square_grid(4, 4, 10.0);

            let mut with_tree = ElementMapper::with_strategy(SearchStrategy::SearchTree);
            with_tree.initialise(Method::Mean, &points, &grid).unwrap();
            let mut brute = ElementMapper::with_strategy(SearchStrategy::BruteForce);
            brute.initialise(Method::Mean, &points, &grid).unwrap();
            prop_assert_eq!(with_tree.matrix(), brute.matrix());
        }

        #[test]
        fn tree_and_brute_force_agree_on_polygon_overlaps(
            dx in 0.0..15.0f64,
            dy in 0.0..15.0f64,
        ) {
            let coarse = square_grid(4, 4, 10.0);
            let mut shifted = Vec::new();
            for element in square_grid(3, 3, 9.0).elements() {
                let vertices =
                    element.vertices().iter().map(|&[x, y]| [x + dx, y + dy]).collect();
                shifted.push(Element::with_vertices(element.id().to_string(), vertices));
            }
            let fine = ElementSet::new("fine", ElementKind::Polygon, shifted);

            for method in [Method::WeightedMean, Method::WeightedSum, Method::Distribute] {
                let mut with_tree = ElementMapper::with_strategy(SearchStrategy::SearchTree);
                with_tree.initialise(method, &coarse, &fine).unwrap();
                let mut brute = ElementMapper::with_strategy(SearchStrategy::BruteForce);
                brute.initialise(method, &coarse, &fine).unwrap();
                prop_assert_eq!(with_tree.matrix(), brute.matrix());
            }
        }

        #[test]
        fn map_values_is_linear(
            values in prop::collection::vec(-100.0..100.0f64, 4),
            other in prop::collection::vec(-100.0..100.0f64, 4),
            factor in -10.0..10.0f64,
        ) {
            let mut mapper = ElementMapper::new();
            mapper.initialise(Method::Mean, &grid_probe_points(), &three_square_grid()).unwrap();

            let base = ValueSet::from_rows(vec![values.clone()]).unwrap();
            let second = ValueSet::from_rows(vec![other.clone()]).unwrap();
            let scaled = ValueSet::from_rows(
                vec![values.iter().map(|v| v * factor).collect()],
            ).unwrap();
            let summed = ValueSet::from_rows(
                vec![values.iter().zip(&other).map(|(a, b)| a + b).collect()],
            ).unwrap();

            let mapped_base = mapper.map_values(&base).unwrap();
            let mapped_second = mapper.map_values(&second).unwrap();
            let mapped_scaled = mapper.map_values(&scaled).unwrap();
            let mapped_summed = mapper.map_values(&summed).unwrap();
            for element in 0..mapped_base.element_count() {
                let expected = mapped_base.value(0, element) * factor;
                let actual = mapped_scaled.value(0, element);
                prop_assert!((expected - actual).abs() <= 1e-9 * expected.abs().max(1.0));

                let expected = mapped_base.value(0, element) + mapped_second.value(0, element);
                let actual = mapped_summed.value(0, element);
                prop_assert!((expected - actual).abs() <= 1e-9 * expected.abs().max(1.0));
            }
        }
    }
}
