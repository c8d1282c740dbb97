use ahash::AHashMap;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::geometry;

/// Geometry kind of the elements in an [`ElementSet`].
///
/// Curvilinear-grid cells and mesh faces are polygonal, so both kinds map
/// through the polygon method catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Point,
    PolyLine,
    Polygon,
    CurvilinearGrid,
    Mesh,
}

impl ElementKind {
    /// Underlying mappable geometry of this kind.
    pub(crate) fn base(self) -> ElementKind {
        match self {
            ElementKind::CurvilinearGrid | ElementKind::Mesh => ElementKind::Polygon,
            kind => kind,
        }
    }

    /// Minimal number of vertices a well-formed element of this kind carries.
    pub fn min_vertex_count(self) -> usize {
        match self.base() {
            ElementKind::Point => 1,
            ElementKind::PolyLine => 2,
            _ => 3,
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::Point => "point",
            ElementKind::PolyLine => "polyline",
            ElementKind::Polygon => "polygon",
            ElementKind::CurvilinearGrid => "curvilinear-grid",
            ElementKind::Mesh => "mesh",
        };
        f.write_str(name)
    }
}

/// A single spatial element: an id, an ordered vertex list, and an optional
/// face list (vertex indices, populated for mesh faces).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: String,
    vertices: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    faces: Vec<Vec<u32>>,
}

impl Element {
    /// Create an empty element with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), vertices: Vec::new(), faces: Vec::new() }
    }

    /// Create an element from an id and a vertex list.
    pub fn with_vertices(id: impl Into<String>, vertices: Vec<[f64; 2]>) -> Self {
        Self { id: id.into(), vertices, faces: Vec::new() }
    }

    /// Append a vertex.
    pub fn add_vertex(&mut self, x: f64, y: f64) {
        self.vertices.push([x, y]);
    }

    /// Append a face given as indices into the vertex list.
    pub fn add_face(&mut self, face: Vec<u32>) {
        self.faces.push(face);
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn vertices(&self) -> &[[f64; 2]] { &self.vertices }

    #[inline] pub fn vertex_count(&self) -> usize { self.vertices.len() }

    #[inline] pub fn faces(&self) -> &[Vec<u32>] { &self.faces }
}

/// An ordered, index-stable collection of elements of one declared kind.
///
/// Element sets are immutable snapshots: a mapping matrix built from a set is
/// only valid while the caller leaves the set's geometry untouched.
#[derive(Debug, Clone)]
pub struct ElementSet {
    id: String,
    kind: ElementKind,
    spatial_reference: Option<String>,
    elements: Vec<Element>,
    by_id: AHashMap<String, usize>,
}

impl ElementSet {
    /// Create an element set from a declared kind and an ordered element list.
    pub fn new(id: impl Into<String>, kind: ElementKind, elements: Vec<Element>) -> Self {
        let by_id = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self { id: id.into(), kind, spatial_reference: None, elements, by_id }
    }

    /// Tag the set with a spatial reference identifier (e.g. a WKT or EPSG string).
    pub fn with_spatial_reference(mut self, reference: impl Into<String>) -> Self {
        self.spatial_reference = Some(reference.into());
        self
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn kind(&self) -> ElementKind { self.kind }

    #[inline] pub fn spatial_reference(&self) -> Option<&str> { self.spatial_reference.as_deref() }

    /// Number of elements in the set.
    #[inline] pub fn len(&self) -> usize { self.elements.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.elements.is_empty() }

    #[inline] pub fn element(&self, index: usize) -> &Element { &self.elements[index] }

    #[inline] pub fn elements(&self) -> &[Element] { &self.elements }

    /// Position of the element with the given id, if present.
    pub fn index_of(&self, element_id: &str) -> Option<usize> {
        self.by_id.get(element_id).copied()
    }

    /// Check every element against the shape rules of the declared kind.
    ///
    /// Points carry exactly one vertex. Polylines carry at least two vertices
    /// and no zero-length segment. Polygons carry at least three vertices,
    /// enclose positive (counter-clockwise) area, and have no crossing or
    /// zero-length boundary segments.
    pub(crate) fn validate(&self) -> Result<()> {
        for element in &self.elements {
            match self.kind.base() {
                ElementKind::Point => {
                    if element.vertex_count() != 1 {
                        return Err(self.shape_error(element, format!(
                            "point element carries {} vertices, expected exactly 1",
                            element.vertex_count()
                        )));
                    }
                }
                ElementKind::PolyLine => {
                    if element.vertex_count() < 2 {
                        return Err(self.shape_error(element, format!(
                            "polyline element carries {} vertices, expected at least 2",
                            element.vertex_count()
                        )));
                    }
                    if let Some(segment) = zero_length_segment(element.vertices(), false) {
                        return Err(self.shape_error(element, format!(
                            "segment {segment} of polyline has zero length"
                        )));
                    }
                }
                _ => {
                    if element.vertex_count() < 3 {
                        return Err(self.shape_error(element, format!(
                            "polygon element carries {} vertices, expected at least 3",
                            element.vertex_count()
                        )));
                    }
                    if let Some(segment) = zero_length_segment(element.vertices(), true) {
                        return Err(self.shape_error(element, format!(
                            "segment {segment} of polygon boundary has zero length"
                        )));
                    }
                    if geometry::ring_signed_area(element.vertices()) <= 0.0 {
                        return Err(self.shape_error(
                            element,
                            "polygon area is zero or negative; vertices must wind counter-clockwise".into(),
                        ));
                    }
                    if let Some((a, b)) = geometry::crossing_boundary_segments(element.vertices()) {
                        return Err(self.shape_error(element, format!(
                            "polygon boundary segments {a} and {b} cross"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn shape_error(&self, element: &Element, reason: String) -> anyhow::Error {
        MappingError::InvalidGeometry { element_id: element.id.clone(), reason }.into()
    }
}

/// Index of the first zero-length segment, walking consecutive vertex pairs
/// and, for closed rings, the closing pair.
fn zero_length_segment(vertices: &[[f64; 2]], closed: bool) -> Option<usize> {
    let n = vertices.len();
    let segments = if closed { n } else { n.saturating_sub(1) };
    (0..segments).find(|&i| {
        let [x1, y1] = vertices[i];
        let [x2, y2] = vertices[(i + 1) % n];
        x1 == x2 && y1 == y2
    })
}
