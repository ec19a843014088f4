//! Administrative hierarchy: parent/child edges between boundaries and places.

mod builder;
mod graph;

pub use builder::{BuildReport, HierarchyBuilder};
pub use graph::HierarchyGraph;
