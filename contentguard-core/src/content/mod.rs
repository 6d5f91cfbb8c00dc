//! Raw content model and shape classification.

pub mod raw;
pub mod shape;

pub use raw::{RawMap, RawNode};
pub use shape::{ContentShape, SanitizationPolicy, ShapeRule};
