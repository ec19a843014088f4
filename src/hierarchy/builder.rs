//! Builds the parent -> child edge set from relation membership and spatial
//! containment.

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{DataIntegrityWarning, StoreError};
use crate::models::{
    AdminLevel, Boundary, EdgeSource, ElementId, HierarchyEdge, Place, CONTAINS_ROLE,
};
use crate::pip::BoundaryIndex;
use crate::store::GeometryStore;

/// Counts from one build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub explicit_edges: usize,
    pub derived_edges: usize,
    pub dropped_members: usize,
    pub inverted_edges: usize,
    pub duplicates_removed: usize,
    pub total_edges: usize,
}

pub struct HierarchyBuilder<'a> {
    store: &'a dyn GeometryStore,
    index: &'a BoundaryIndex,
    diagnostics: &'a Diagnostics,
    parallel: bool,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(
        store: &'a dyn GeometryStore,
        index: &'a BoundaryIndex,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            store,
            index,
            diagnostics,
            parallel: true,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Produce the deduplicated edge set.
    ///
    /// Explicit membership edges come first and win deduplication against
    /// derived edges for the same (parent, child) pair.
    pub fn build(
        &self,
        boundaries: &[Arc<Boundary>],
        places: &[Arc<Place>],
    ) -> (Vec<HierarchyEdge>, BuildReport) {
        info!(
            "Building hierarchy from {} boundaries and {} places...",
            boundaries.len(),
            places.len()
        );
        let mut report = BuildReport::default();

        let explicit = self.explicit_edges(boundaries);
        let explicit = self.backfill(explicit, places, &mut report);
        report.explicit_edges = explicit.len();

        let has_parent: HashSet<ElementId> = explicit.iter().map(|e| e.child).collect();
        let derived = self.derived_edges(boundaries, places, &has_parent);
        report.derived_edges = derived.len();

        let mut seen: HashSet<(ElementId, ElementId)> = HashSet::new();
        let mut edges = Vec::with_capacity(explicit.len() + derived.len());
        for edge in explicit.into_iter().chain(derived) {
            if seen.insert((edge.parent, edge.child)) {
                edges.push(edge);
            } else {
                report.duplicates_removed += 1;
            }
        }
        report.total_edges = edges.len();

        info!(
            "Hierarchy built: {} edges ({} explicit, {} derived, {} duplicates removed)",
            report.total_edges, report.explicit_edges, report.derived_edges, report.duplicates_removed
        );
        if report.dropped_members > 0 {
            warn!(
                "Dropped {} relation members missing from the store",
                report.dropped_members
            );
        }

        (edges, report)
    }

    /// One edge per relation member, child level and name still unresolved
    fn explicit_edges(&self, boundaries: &[Arc<Boundary>]) -> Vec<HierarchyEdge> {
        boundaries
            .iter()
            .flat_map(|parent| {
                parent.members.iter().map(move |m| HierarchyEdge {
                    parent: parent.id,
                    parent_level: parent.level,
                    parent_name: parent.name.clone(),
                    child: m.member,
                    child_level: None,
                    child_name: None,
                    role: m.role.clone(),
                    source: EdgeSource::Explicit,
                })
            })
            .collect()
    }

    /// Fill in child level and name now that every boundary is known.
    /// Members absent from the store are dropped.
    fn backfill(
        &self,
        edges: Vec<HierarchyEdge>,
        places: &[Arc<Place>],
        report: &mut BuildReport,
    ) -> Vec<HierarchyEdge> {
        let places_by_id: HashMap<ElementId, &Arc<Place>> =
            places.iter().map(|p| (p.id, p)).collect();

        let mut kept = Vec::with_capacity(edges.len());
        for mut edge in edges {
            match self.store.boundary_by_id(edge.child) {
                Ok(child) => {
                    edge.child_level = Some(child.level);
                    edge.child_name = child.name.clone();
                    if edge.is_inverted() {
                        report.inverted_edges += 1;
                        self.diagnostics.record(&DataIntegrityWarning::InvertedEdge {
                            parent: edge.parent,
                            parent_level: edge.parent_level,
                            child: edge.child,
                            child_level: child.level,
                        });
                    }
                }
                Err(StoreError::NotFound(_)) => match places_by_id.get(&edge.child) {
                    Some(place) => edge.child_name = Some(place.name.clone()),
                    None => {
                        report.dropped_members += 1;
                        self.diagnostics.record(&DataIntegrityWarning::DanglingMember {
                            parent: edge.parent,
                            member: edge.child,
                        });
                        continue;
                    }
                },
                Err(e) => {
                    // Any other store error is treated like a missing reference
                    warn!("Lookup of {} failed: {}", edge.child, e);
                    report.dropped_members += 1;
                    self.diagnostics.record(&DataIntegrityWarning::DanglingMember {
                        parent: edge.parent,
                        member: edge.child,
                    });
                    continue;
                }
            }
            kept.push(edge);
        }
        kept
    }

    /// Containment edges for every place and every boundary without an
    /// explicit parent
    fn derived_edges(
        &self,
        boundaries: &[Arc<Boundary>],
        places: &[Arc<Place>],
        has_parent: &HashSet<ElementId>,
    ) -> Vec<HierarchyEdge> {
        let orphans: Vec<&Arc<Boundary>> = boundaries
            .iter()
            .filter(|b| b.geometry.is_some() && !has_parent.contains(&b.id))
            .collect();

        info!(
            "Deriving containment edges for {} places and {} orphan boundaries",
            places.len(),
            orphans.len()
        );

        let (from_places, from_boundaries): (Vec<Vec<HierarchyEdge>>, Vec<Vec<HierarchyEdge>>) =
            if self.parallel {
                (
                    places.par_iter().map(|p| self.derive_for_place(p)).collect(),
                    orphans
                        .par_iter()
                        .map(|b| self.derive_for_boundary(b))
                        .collect(),
                )
            } else {
                (
                    places.iter().map(|p| self.derive_for_place(p)).collect(),
                    orphans.iter().map(|b| self.derive_for_boundary(b)).collect(),
                )
            };

        from_places
            .into_iter()
            .chain(from_boundaries)
            .flatten()
            .collect()
    }

    fn derive_for_place(&self, place: &Place) -> Vec<HierarchyEdge> {
        AdminLevel::distinguished()
            .iter()
            .filter_map(|&level| self.index.containing_point_at_level(place.location, level))
            .map(|parent| contains_edge(&parent, place.id, None, Some(place.name.clone())))
            .collect()
    }

    fn derive_for_boundary(&self, boundary: &Boundary) -> Vec<HierarchyEdge> {
        AdminLevel::distinguished()
            .iter()
            .filter(|level| level.is_above(boundary.level))
            .filter_map(|&level| self.index.containing_boundary_at_level(boundary, level))
            .map(|parent| {
                contains_edge(
                    &parent,
                    boundary.id,
                    Some(boundary.level),
                    boundary.name.clone(),
                )
            })
            .collect()
    }
}

fn contains_edge(
    parent: &Boundary,
    child: ElementId,
    child_level: Option<AdminLevel>,
    child_name: Option<String>,
) -> HierarchyEdge {
    HierarchyEdge {
        parent: parent.id,
        parent_level: parent.level,
        parent_name: parent.name.clone(),
        child,
        child_level,
        child_name,
        role: CONTAINS_ROLE.to_string(),
        source: EdgeSource::Derived,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PlaceKind, RelationMember};
    use crate::store::MemoryStore;
    use geo::{polygon, MultiPolygon};

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ]])
    }

    fn boundary(id: i64, level: u8, name: &str, geometry: MultiPolygon<f64>) -> Boundary {
        Boundary::new(ElementId::relation(id), AdminLevel(level), Some(name.to_string()))
            .with_geometry(geometry)
    }

    fn build(store: &MemoryStore) -> (Vec<HierarchyEdge>, BuildReport, Diagnostics) {
        let boundaries = store.all_boundaries().unwrap();
        let places = store.all_places().unwrap();
        let index = BoundaryIndex::build(boundaries.iter().cloned());
        let diagnostics = Diagnostics::new();
        let (edges, report) = HierarchyBuilder::new(store, &index, &diagnostics)
            .parallel(false)
            .build(&boundaries, &places);
        (edges, report, diagnostics)
    }

    fn find<'e>(edges: &'e [HierarchyEdge], parent: i64, child: ElementId) -> Option<&'e HierarchyEdge> {
        edges
            .iter()
            .find(|e| e.parent == ElementId::relation(parent) && e.child == child)
    }

    #[test]
    fn test_explicit_edges_backfilled() {
        let mut country = boundary(1, 2, "Country", rect(0.0, 0.0, 10.0, 10.0));
        country.members = vec![RelationMember {
            member: ElementId::relation(2),
            role: "subarea".to_string(),
        }];
        let state = boundary(2, 4, "State", rect(0.0, 0.0, 5.0, 5.0));
        let store = MemoryStore::new(vec![country, state], vec![]);

        let (edges, report, _) = build(&store);
        let edge = find(&edges, 1, ElementId::relation(2)).unwrap();
        assert_eq!(edge.source, EdgeSource::Explicit);
        assert_eq!(edge.role, "subarea");
        assert_eq!(edge.child_level, Some(AdminLevel::STATE));
        assert_eq!(edge.child_name.as_deref(), Some("State"));
        assert_eq!(report.explicit_edges, 1);
        // State already has an explicit parent: no derived edge for it
        assert_eq!(report.derived_edges, 0);
    }

    #[test]
    fn test_dangling_member_dropped_and_counted() {
        let mut country = boundary(1, 2, "Country", rect(0.0, 0.0, 10.0, 10.0));
        country.members = vec![
            RelationMember {
                member: ElementId::way(99),
                role: "outer".to_string(),
            },
            RelationMember {
                member: ElementId::relation(404),
                role: "subarea".to_string(),
            },
        ];
        let store = MemoryStore::new(vec![country], vec![]);

        let (edges, report, diagnostics) = build(&store);
        assert!(edges.is_empty());
        assert_eq!(report.dropped_members, 2);
        assert_eq!(diagnostics.snapshot().dropped_member_refs, 2);
    }

    #[test]
    fn test_place_member_kept() {
        let mut state = boundary(2, 4, "State", rect(0.0, 0.0, 5.0, 5.0));
        state.members = vec![RelationMember {
            member: ElementId::node(10),
            role: "admin_centre".to_string(),
        }];
        let capital = Place::new(ElementId::node(10), PlaceKind::City, "Capital", GeoPoint::new(1.0, 1.0));
        let store = MemoryStore::new(vec![state], vec![capital]);

        let (edges, report, _) = build(&store);
        let edge = find(&edges, 2, ElementId::node(10)).unwrap();
        // Explicit edge wins over the derived one for the same pair
        assert_eq!(edge.source, EdgeSource::Explicit);
        assert_eq!(edge.role, "admin_centre");
        assert_eq!(edge.child_level, None);
        assert_eq!(edge.child_name.as_deref(), Some("Capital"));
        assert_eq!(report.duplicates_removed, 1);
    }

    #[test]
    fn test_derived_edges_for_places_and_orphans() {
        let country = boundary(1, 2, "Country", rect(0.0, 0.0, 10.0, 10.0));
        let state = boundary(2, 4, "State", rect(0.0, 0.0, 5.0, 5.0));
        let county = boundary(3, 6, "County", rect(0.0, 0.0, 2.0, 2.0));
        let village = Place::new(ElementId::node(10), PlaceKind::Village, "Village", GeoPoint::new(1.0, 1.0));
        let store = MemoryStore::new(vec![country, state, county], vec![village]);

        let (edges, _, _) = build(&store);

        // Place -> state and place -> country
        let to_state = find(&edges, 2, ElementId::node(10)).unwrap();
        assert_eq!(to_state.source, EdgeSource::Derived);
        assert_eq!(to_state.role, CONTAINS_ROLE);
        assert!(find(&edges, 1, ElementId::node(10)).is_some());

        // Orphan state -> country, orphan county -> state and country
        assert!(find(&edges, 1, ElementId::relation(2)).is_some());
        assert!(find(&edges, 2, ElementId::relation(3)).is_some());
        assert!(find(&edges, 1, ElementId::relation(3)).is_some());

        // Country has nothing above it
        assert!(edges.iter().all(|e| e.child != ElementId::relation(1)));
    }

    #[test]
    fn test_unlabeled_levels_are_not_derived_parents() {
        let county = boundary(3, 6, "County", rect(0.0, 0.0, 2.0, 2.0));
        let village = Place::new(ElementId::node(10), PlaceKind::Village, "Village", GeoPoint::new(1.0, 1.0));
        let store = MemoryStore::new(vec![county], vec![village]);

        let (edges, _, _) = build(&store);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_inverted_edge_kept_and_counted() {
        let mut county = boundary(3, 6, "County", rect(0.0, 0.0, 2.0, 2.0));
        county.members = vec![RelationMember {
            member: ElementId::relation(2),
            role: "subarea".to_string(),
        }];
        let state = boundary(2, 4, "State", rect(0.0, 0.0, 5.0, 5.0));
        let store = MemoryStore::new(vec![county, state], vec![]);

        let (edges, report, diagnostics) = build(&store);
        assert!(find(&edges, 3, ElementId::relation(2)).unwrap().is_inverted());
        assert_eq!(report.inverted_edges, 1);
        assert_eq!(diagnostics.snapshot().inverted_edges, 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let country = boundary(1, 2, "Country", rect(0.0, 0.0, 10.0, 10.0));
        let state = boundary(2, 4, "State", rect(0.0, 0.0, 5.0, 5.0));
        let places: Vec<Place> = (0..20)
            .map(|i| {
                Place::new(
                    ElementId::node(i),
                    PlaceKind::Town,
                    format!("Town {i}"),
                    GeoPoint::new(0.4 * i as f64, 0.3 * i as f64),
                )
            })
            .collect();
        let store = MemoryStore::new(vec![country, state], places);
        let boundaries = store.all_boundaries().unwrap();
        let places = store.all_places().unwrap();
        let index = BoundaryIndex::build(boundaries.iter().cloned());
        let diagnostics = Diagnostics::new();

        let (sequential, _) = HierarchyBuilder::new(&store, &index, &diagnostics)
            .parallel(false)
            .build(&boundaries, &places);
        let (parallel, _) = HierarchyBuilder::new(&store, &index, &diagnostics)
            .parallel(true)
            .build(&boundaries, &places);
        assert_eq!(sequential, parallel);
    }
}
