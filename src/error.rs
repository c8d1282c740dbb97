use std::fmt;

use crate::element::ElementKind;
use crate::method::Method;

/// Fatal failure modes of the mapping engine.
///
/// All variants surface synchronously and leave no partial matrix state
/// behind. "No coverage" (a target element without any overlapping source)
/// is deliberately not an error: it is represented by an empty matrix row,
/// queryable through [`crate::MappingMatrix::has_coverage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// An element violates the shape rules of its declared kind.
    InvalidGeometry { element_id: String, reason: String },
    /// The requested method is not defined for the given geometry pair.
    UnsupportedMapping { method: Method, from: ElementKind, to: ElementKind },
    /// A value set's element axis disagrees with the matrix source dimension.
    SizeMismatch { expected: usize, actual: usize },
    /// `map_values` was called before a successful `initialise`.
    NotInitialised,
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::InvalidGeometry { element_id, reason } => {
                write!(f, "invalid geometry in element '{element_id}': {reason}")
            }
            MappingError::UnsupportedMapping { method, from, to } => {
                write!(f, "no '{method}' mapping is defined from {from} elements to {to} elements")
            }
            MappingError::SizeMismatch { expected, actual } => {
                write!(
                    f,
                    "value set has {actual} elements but the mapping matrix expects {expected} source elements"
                )
            }
            MappingError::NotInitialised => {
                write!(f, "the element mapper must be initialised before values can be mapped")
            }
        }
    }
}

impl std::error::Error for MappingError {}
