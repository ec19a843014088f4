//! Read-only counters for operational tooling.
//!
//! Counters only ever increase. Build-time counters are filled while a
//! snapshot is assembled; query-time counters are shared by all resolves
//! against that snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::DataIntegrityWarning;

#[derive(Debug, Default)]
pub struct Diagnostics {
    dropped_member_refs: AtomicU64,
    null_geometry_boundaries: AtomicU64,
    invalid_geometry_rings: AtomicU64,
    inverted_edges: AtomicU64,
    cyclic_edges: AtomicU64,
    ascent_depth_exceeded: AtomicU64,
    ascent_budget_exhausted: AtomicU64,
    invalid_places: AtomicU64,
    approximate_city_resolutions: AtomicU64,
    derived_country_resolutions: AtomicU64,
    not_found_resolutions: AtomicU64,
    resolutions: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub dropped_member_refs: u64,
    pub null_geometry_boundaries: u64,
    pub invalid_geometry_rings: u64,
    pub inverted_edges: u64,
    pub cyclic_edges: u64,
    pub ascent_depth_exceeded: u64,
    pub ascent_budget_exhausted: u64,
    pub invalid_places: u64,
    pub approximate_city_resolutions: u64,
    pub derived_country_resolutions: u64,
    pub not_found_resolutions: u64,
    pub resolutions: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a data integrity problem and log it
    pub fn record(&self, warning: &DataIntegrityWarning) {
        debug!("data integrity: {}", warning);
        let counter = match warning {
            DataIntegrityWarning::DanglingMember { .. } => &self.dropped_member_refs,
            DataIntegrityWarning::NullGeometry { .. } => &self.null_geometry_boundaries,
            DataIntegrityWarning::InvalidRing { .. } => &self.invalid_geometry_rings,
            DataIntegrityWarning::InvertedEdge { .. } => &self.inverted_edges,
            DataIntegrityWarning::CyclicEdge { .. } => &self.cyclic_edges,
            DataIntegrityWarning::AscentDepthExceeded { .. } => &self.ascent_depth_exceeded,
            DataIntegrityWarning::AscentBudgetExhausted { .. } => &self.ascent_budget_exhausted,
            DataIntegrityWarning::InvalidPlace { .. } => &self.invalid_places,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self, city_approximate: bool, country_derived: bool) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        if city_approximate {
            self.approximate_city_resolutions
                .fetch_add(1, Ordering::Relaxed);
        }
        if country_derived {
            self.derived_country_resolutions
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_not_found(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.not_found_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        DiagnosticsSnapshot {
            dropped_member_refs: load(&self.dropped_member_refs),
            null_geometry_boundaries: load(&self.null_geometry_boundaries),
            invalid_geometry_rings: load(&self.invalid_geometry_rings),
            inverted_edges: load(&self.inverted_edges),
            cyclic_edges: load(&self.cyclic_edges),
            ascent_depth_exceeded: load(&self.ascent_depth_exceeded),
            ascent_budget_exhausted: load(&self.ascent_budget_exhausted),
            invalid_places: load(&self.invalid_places),
            approximate_city_resolutions: load(&self.approximate_city_resolutions),
            derived_country_resolutions: load(&self.derived_country_resolutions),
            not_found_resolutions: load(&self.not_found_resolutions),
            resolutions: load(&self.resolutions),
        }
    }
}
