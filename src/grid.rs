//! Structured-geometry adapters: curvilinear grids and unstructured meshes
//! flatten into polygon element sets so the mapper can treat their cells and
//! faces like any other polygon.

use anyhow::Result;

use crate::element::{Element, ElementKind, ElementSet};
use crate::error::MappingError;

/// A logically rectangular grid of quadrilateral cells given by its node
/// coordinates, `(rows + 1) * (cols + 1)` of them in row-major order.
#[derive(Debug, Clone)]
pub struct CurvilinearGrid {
    id: String,
    rows: usize,
    cols: usize,
    nodes: Vec<[f64; 2]>,
}

impl CurvilinearGrid {
    /// Create a grid from its node coordinates.
    ///
    /// Node `(r, c)` lives at index `r * (cols + 1) + c`; the node count must
    /// match the cell layout exactly.
    pub fn new(
        id: impl Into<String>,
        rows: usize,
        cols: usize,
        nodes: Vec<[f64; 2]>,
    ) -> Result<Self> {
        let id = id.into();
        let expected = (rows + 1) * (cols + 1);
        if nodes.len() != expected {
            return Err(MappingError::InvalidGeometry {
                element_id: id,
                reason: format!(
                    "{rows}x{cols} grid needs {expected} nodes, got {}",
                    nodes.len()
                ),
            }
            .into());
        }
        Ok(Self { id, rows, cols, nodes })
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn rows(&self) -> usize { self.rows }

    #[inline] pub fn cols(&self) -> usize { self.cols }

    /// Node coordinate at grid position `(row, col)`.
    #[inline]
    pub fn node(&self, row: usize, col: usize) -> [f64; 2] {
        self.nodes[row * (self.cols + 1) + col]
    }

    /// Flatten the grid into one polygon element per cell, row-major, each
    /// cell's corners walked counter-clockwise. Cell ids are `"{grid}:{r}:{c}"`.
    pub fn to_element_set(&self) -> ElementSet {
        let mut elements = Vec::with_capacity(self.rows * self.cols);
        for r in 0..self.rows {
            for c in 0..self.cols {
                elements.push(Element::with_vertices(
                    format!("{}:{r}:{c}", self.id),
                    vec![
                        self.node(r, c),
                        self.node(r, c + 1),
                        self.node(r + 1, c + 1),
                        self.node(r + 1, c),
                    ],
                ));
            }
        }
        ElementSet::new(self.id.clone(), ElementKind::CurvilinearGrid, elements)
    }
}

/// An unstructured mesh: a shared node pool plus faces given as node indices.
#[derive(Debug, Clone)]
pub struct Mesh {
    id: String,
    nodes: Vec<[f64; 2]>,
    faces: Vec<Vec<u32>>,
}

impl Mesh {
    /// Create a mesh, checking every face index against the node pool.
    pub fn new(id: impl Into<String>, nodes: Vec<[f64; 2]>, faces: Vec<Vec<u32>>) -> Result<Self> {
        let id = id.into();
        for (face, indices) in faces.iter().enumerate() {
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= nodes.len()) {
                return Err(MappingError::InvalidGeometry {
                    element_id: format!("{id}:{face}"),
                    reason: format!(
                        "face references node {bad}, but the mesh has {} nodes",
                        nodes.len()
                    ),
                }
                .into());
            }
        }
        Ok(Self { id, nodes, faces })
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    #[inline] pub fn node_count(&self) -> usize { self.nodes.len() }

    #[inline] pub fn face_count(&self) -> usize { self.faces.len() }

    /// Flatten the mesh into one polygon element per face, resolving node
    /// indices into coordinates. Face ids are `"{mesh}:{face}"`.
    pub fn to_element_set(&self) -> ElementSet {
        let elements = self
            .faces
            .iter()
            .enumerate()
            .map(|(face, indices)| {
                let vertices = indices.iter().map(|&i| self.nodes[i as usize]).collect();
                let mut element = Element::with_vertices(format!("{}:{face}", self.id), vertices);
                element.add_face((0..indices.len() as u32).collect());
                element
            })
            .collect();
        ElementSet::new(self.id.clone(), ElementKind::Mesh, elements)
    }
}
