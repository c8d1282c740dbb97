use rstar::{AABB, RTree, RTreeObject};
use smallvec::SmallVec;

use crate::element::{Element, ElementSet};
use crate::geometry::EPSILON;

/// Candidate-lookup strategy used while building a mapping matrix.
///
/// Both strategies produce bit-identical matrices: the tree only culls
/// candidate pairs whose exact overlap measure would be zero, and candidates
/// are visited in ascending index order either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Build a search tree only when both element sets are large enough to
    /// pay for the index construction.
    #[default]
    Auto,
    /// Always accelerate candidate lookup with the search tree.
    SearchTree,
    /// Compare every source element against every target element.
    BruteForce,
}

/// Index entry: one element's bounding box.
#[derive(Debug, Clone)]
struct ElementEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ElementEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable bounding-box index over one element set.
///
/// The tree is a snapshot: it must be rebuilt if the caller replaces the
/// underlying element geometry. Queries only cull candidates — exact
/// geometry tests always run on whatever the tree returns.
#[derive(Debug)]
pub struct SearchTree {
    tree: RTree<ElementEnvelope>,
}

impl SearchTree {
    /// Build the index from the bounding boxes of every element in the set.
    pub fn build(set: &ElementSet) -> Self {
        let envelopes = set
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, element)| element.vertex_count() > 0)
            .map(|(index, element)| ElementEnvelope { index, envelope: element_extent(element) })
            .collect();
        Self { tree: RTree::bulk_load(envelopes) }
    }

    /// Indices of elements whose bounding boxes intersect `extent`, in
    /// ascending order.
    pub fn query(&self, extent: &AABB<[f64; 2]>) -> SmallVec<[usize; 16]> {
        let mut hits: SmallVec<[usize; 16]> = self
            .tree
            .locate_in_envelope_intersecting(extent)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Number of indexed elements.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Bounding box of an element's vertices, padded by a hair so that queries
/// for elements touching a boundary still surface the neighbour.
pub(crate) fn element_extent(element: &Element) -> AABB<[f64; 2]> {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for &[x, y] in element.vertices() {
        min[0] = min[0].min(x);
        min[1] = min[1].min(y);
        max[0] = max[0].max(x);
        max[1] = max[1].max(y);
    }
    AABB::from_corners(
        [min[0] - EPSILON, min[1] - EPSILON],
        [max[0] + EPSILON, max[1] + EPSILON],
    )
}
