use hashbrown::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::GeometryStore;
use crate::error::{DataIntegrityWarning, StoreError};
use crate::models::{Boundary, ElementId, Place};

/// In-memory geometry store.
///
/// Duplicate boundary ids keep the first record.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    boundaries: Vec<Arc<Boundary>>,
    by_id: HashMap<ElementId, usize>,
    places: Vec<Arc<Place>>,
    warnings: Vec<DataIntegrityWarning>,
}

impl MemoryStore {
    pub fn new(boundaries: Vec<Boundary>, places: Vec<Place>) -> Self {
        let mut store = Self::default();
        for boundary in boundaries {
            store.insert_boundary(boundary);
        }
        store.places = places.into_iter().map(Arc::new).collect();
        store
    }

    pub fn insert_boundary(&mut self, boundary: Boundary) {
        if self.by_id.contains_key(&boundary.id) {
            warn!("Duplicate boundary {} ignored", boundary.id);
            return;
        }
        self.by_id.insert(boundary.id, self.boundaries.len());
        self.boundaries.push(Arc::new(boundary));
    }

    pub fn insert_place(&mut self, place: Place) {
        self.places.push(Arc::new(place));
    }

    pub(crate) fn push_warning(&mut self, warning: DataIntegrityWarning) {
        self.warnings.push(warning);
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }
}

impl GeometryStore for MemoryStore {
    fn all_boundaries(&self) -> Result<Vec<Arc<Boundary>>, StoreError> {
        Ok(self.boundaries.clone())
    }

    fn all_places(&self) -> Result<Vec<Arc<Place>>, StoreError> {
        Ok(self.places.clone())
    }

    fn boundary_by_id(&self, id: ElementId) -> Result<Arc<Boundary>, StoreError> {
        self.by_id
            .get(&id)
            .map(|&i| Arc::clone(&self.boundaries[i]))
            .ok_or(StoreError::NotFound(id))
    }

    fn load_warnings(&self) -> Vec<DataIntegrityWarning> {
        self.warnings.clone()
    }
}
