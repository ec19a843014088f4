//! Immutable, fully built resolution data and the handle that swaps it.

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use crate::config::BuilderConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{DataIntegrityWarning, SnapshotLoadFailure};
use crate::hierarchy::{BuildReport, HierarchyBuilder, HierarchyGraph};
use crate::models::{Boundary, ElementId, Place};
use crate::pip::{BoundaryIndex, PlaceIndex};
use crate::store::GeometryStore;

/// Everything a resolve call reads. Never mutated after construction apart
/// from its diagnostics counters.
pub struct Snapshot {
    boundaries: HashMap<ElementId, Arc<Boundary>>,
    index: BoundaryIndex,
    places: PlaceIndex,
    graph: HierarchyGraph,
    diagnostics: Diagnostics,
    report: Option<BuildReport>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Index the store's contents and build the hierarchy from scratch
    pub fn load(
        store: &dyn GeometryStore,
        config: &BuilderConfig,
    ) -> Result<Self, SnapshotLoadFailure> {
        let (boundaries, places, diagnostics) = read_store(store)?;
        let index = BoundaryIndex::build(boundaries.iter().cloned());
        let place_index = PlaceIndex::build(places.iter().cloned());
        ensure_not_empty(&index, &place_index)?;

        let (edges, report) = HierarchyBuilder::new(store, &index, &diagnostics)
            .parallel(config.parallel)
            .build(&boundaries, &places);

        Ok(Self::assemble(
            boundaries,
            index,
            place_index,
            HierarchyGraph::from_edges(edges),
            diagnostics,
            Some(report),
        ))
    }

    /// Index the store's contents and reuse a persisted edge set
    pub fn load_with_edges<P: AsRef<Path>>(
        store: &dyn GeometryStore,
        edges: P,
    ) -> Result<Self, SnapshotLoadFailure> {
        let (boundaries, places, diagnostics) = read_store(store)?;
        let index = BoundaryIndex::build(boundaries.iter().cloned());
        let place_index = PlaceIndex::build(places.iter().cloned());
        ensure_not_empty(&index, &place_index)?;

        let graph = HierarchyGraph::read_csv(edges)?;

        Ok(Self::assemble(
            boundaries,
            index,
            place_index,
            graph,
            diagnostics,
            None,
        ))
    }

    fn assemble(
        boundaries: Vec<Arc<Boundary>>,
        index: BoundaryIndex,
        places: PlaceIndex,
        graph: HierarchyGraph,
        diagnostics: Diagnostics,
        report: Option<BuildReport>,
    ) -> Self {
        let boundaries: HashMap<ElementId, Arc<Boundary>> =
            boundaries.into_iter().map(|b| (b.id, b)).collect();

        info!(
            "Snapshot ready: {} boundaries ({} indexed), {} places, {} edges",
            boundaries.len(),
            index.len(),
            places.len(),
            graph.len()
        );

        Self {
            boundaries,
            index,
            places,
            graph,
            diagnostics,
            report,
            built_at: Utc::now(),
        }
    }

    pub fn boundary(&self, id: ElementId) -> Option<&Arc<Boundary>> {
        self.boundaries.get(&id)
    }

    pub(crate) fn boundaries(&self) -> &HashMap<ElementId, Arc<Boundary>> {
        &self.boundaries
    }

    pub fn index(&self) -> &BoundaryIndex {
        &self.index
    }

    pub fn places(&self) -> &PlaceIndex {
        &self.places
    }

    pub fn graph(&self) -> &HierarchyGraph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// `None` when the edge set was loaded from disk
    pub fn report(&self) -> Option<&BuildReport> {
        self.report.as_ref()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

type StoreContents = (Vec<Arc<Boundary>>, Vec<Arc<Place>>, Diagnostics);

fn read_store(store: &dyn GeometryStore) -> Result<StoreContents, SnapshotLoadFailure> {
    let boundaries = store.all_boundaries()?;
    let places = store.all_places()?;

    let diagnostics = Diagnostics::new();
    for warning in store.load_warnings() {
        diagnostics.record(&warning);
    }
    for boundary in boundaries.iter().filter(|b| b.geometry.is_none()) {
        diagnostics.record(&DataIntegrityWarning::NullGeometry {
            boundary: boundary.id,
        });
    }
    for place in places.iter().filter(|p| !p.location.is_valid()) {
        diagnostics.record(&DataIntegrityWarning::InvalidPlace { place: place.id });
    }

    Ok((boundaries, places, diagnostics))
}

fn ensure_not_empty(index: &BoundaryIndex, places: &PlaceIndex) -> Result<(), SnapshotLoadFailure> {
    if index.is_empty() && places.is_empty() {
        return Err(SnapshotLoadFailure::Empty {
            boundaries: index.len(),
            places: places.len(),
        });
    }
    Ok(())
}

/// Shared pointer to the current snapshot.
///
/// Readers take a clone of the `Arc` and keep using it for as long as they
/// like; a replacement only affects callers that ask afterwards.
pub struct SnapshotHandle {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install a new snapshot, returning the one it replaced
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Build a snapshot with `load` and install it. On failure the current
    /// snapshot stays in place.
    pub fn reload<F>(&self, load: F) -> Result<Arc<Snapshot>, SnapshotLoadFailure>
    where
        F: FnOnce() -> Result<Snapshot, SnapshotLoadFailure>,
    {
        match load() {
            Ok(snapshot) => {
                self.replace(snapshot);
                info!("Snapshot replaced");
                Ok(self.current())
            }
            Err(e) => {
                warn!("Snapshot reload failed, keeping current snapshot: {}", e);
                Err(e)
            }
        }
    }
}
