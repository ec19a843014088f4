//! Point-in-Polygon (PIP) lookups.
//!
//! Boundary containment through an R-tree over bounding boxes with exact
//! polygon confirmation, plus nearest-place search over place points.

pub mod geometry;
mod index;
mod places;

pub use geometry::{multipolygon_from_geojson, representative_point, sanitize_multipolygon};
pub use index::{BoundaryIndex, IndexedBoundary};
pub use places::{distance_m, PlaceHit, PlaceIndex};
