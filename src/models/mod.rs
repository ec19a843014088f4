//! Core data models for the resolution engine.

pub mod admin;
pub mod hierarchy;
pub mod place;

pub use admin::{AdminLevel, Boundary, LevelRole, RelationMember};
pub use hierarchy::{EdgeSource, HierarchyEdge, ResolvedLocation, CONTAINS_ROLE};
pub use place::{ElementId, ElementKind, GeoPoint, Place, PlaceKind};
