#![doc = "Spatial element-mapping engine: weight matrices between element sets"]
mod element;
mod error;
mod geometry;
mod grid;
mod mapper;
mod matrix;
mod method;
mod search;
mod values;

#[doc(inline)]
pub use element::{Element, ElementKind, ElementSet};

#[doc(inline)]
pub use error::MappingError;

#[doc(inline)]
pub use grid::{CurvilinearGrid, Mesh};

#[doc(inline)]
pub use mapper::ElementMapper;

#[doc(inline)]
pub use matrix::MappingMatrix;

#[doc(inline)]
pub use method::{Method, MethodDescriptor, available_methods};

#[doc(inline)]
pub use search::{SearchStrategy, SearchTree};

#[doc(inline)]
pub use values::ValueSet;
