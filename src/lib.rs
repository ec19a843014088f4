//! Georesolve - reverse geocoding of coordinates to city, state and country
//!
//! This library provides the resolution engine shared by the ingest and query binaries.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod pip;
pub mod policy;
pub mod resolver;
pub mod store;

pub use error::{DataIntegrityWarning, ResolveError, SnapshotLoadFailure, StoreError};
pub use models::{AdminLevel, Boundary, ElementId, GeoPoint, Place, ResolvedLocation};
pub use resolver::{Resolver, Snapshot, SnapshotHandle};
