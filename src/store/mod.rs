//! Geometry store: the engine's read-only view of boundaries and places.
//!
//! The engine never mutates the store. A snapshot is built from whatever the
//! store returns at load time.

mod memory;
mod ndjson;

use std::sync::Arc;

use crate::error::{DataIntegrityWarning, StoreError};
use crate::models::{Boundary, ElementId, Place};

pub use memory::MemoryStore;
pub use ndjson::NdjsonStore;

pub trait GeometryStore: Send + Sync {
    fn all_boundaries(&self) -> Result<Vec<Arc<Boundary>>, StoreError>;

    fn all_places(&self) -> Result<Vec<Arc<Place>>, StoreError>;

    /// `StoreError::NotFound` when the id is not in the store
    fn boundary_by_id(&self, id: ElementId) -> Result<Arc<Boundary>, StoreError>;

    /// Problems repaired or skipped while the store was loaded
    fn load_warnings(&self) -> Vec<DataIntegrityWarning> {
        Vec::new()
    }
}
