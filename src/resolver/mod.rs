//! Reverse geocoding: point -> city, state, country.
//!
//! A resolve anchors on the nearest place within the search radius and walks
//! up the hierarchy graph from it. When no place is close enough, or the
//! place's ascent finds no state or country, the query point itself is
//! anchored through the boundaries that contain it.

mod ascent;
mod snapshot;

use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::diagnostics::DiagnosticsSnapshot;
use crate::error::{DataIntegrityWarning, ResolveError};
use crate::models::{AdminLevel, Boundary, ElementId, GeoPoint, ResolvedLocation};
use crate::pip::PlaceHit;
use crate::policy::{FallbackPolicy, PlaceMatch};

pub use ascent::{Ancestor, Ascent, AscentOutcome, AscentPath, Hop};
pub use snapshot::{Snapshot, SnapshotHandle};

/// A resolved location plus the integrity problems met while resolving it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub location: ResolvedLocation,
    pub warnings: Vec<DataIntegrityWarning>,
}

/// One boundary containing a point, for debugging output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryMatch {
    pub id: ElementId,
    pub level: AdminLevel,
    pub name: Option<String>,
    /// Bounding-box area, square degrees
    pub bbox_area: Option<f64>,
}

/// Resolves points against one snapshot. Cheap to clone and safe to share
/// across threads.
#[derive(Clone)]
pub struct Resolver {
    snapshot: Arc<Snapshot>,
    policy: FallbackPolicy,
    prefer_english: bool,
}

impl Resolver {
    pub fn new(snapshot: Arc<Snapshot>, config: &ResolverConfig) -> Self {
        Self {
            snapshot,
            policy: FallbackPolicy::from_config(config),
            prefer_english: config.prefer_english_names,
        }
    }

    /// Resolver over whatever snapshot the handle currently holds
    pub fn from_handle(handle: &SnapshotHandle, config: &ResolverConfig) -> Self {
        Self::new(handle.current(), config)
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.snapshot.diagnostics().snapshot()
    }

    pub fn resolve(&self, point: GeoPoint) -> Result<ResolvedLocation, ResolveError> {
        self.resolve_detailed(point).map(|r| r.location)
    }

    /// Resolve every point in parallel; results keep input order
    pub fn resolve_batch(&self, points: &[GeoPoint]) -> Vec<Result<ResolvedLocation, ResolveError>> {
        points.par_iter().map(|&p| self.resolve(p)).collect()
    }

    pub fn resolve_detailed(&self, point: GeoPoint) -> Result<Resolution, ResolveError> {
        if !point.is_valid() {
            return Err(ResolveError::InvalidInput {
                lat: point.lat,
                lon: point.lon,
            });
        }

        let diagnostics = self.snapshot.diagnostics();
        let containing = self.snapshot.index().containing_point(point);
        let place_hit = self
            .snapshot
            .places()
            .nearest_within(point, self.policy.search_radius_m);

        if containing.is_empty() && place_hit.is_none() {
            diagnostics.record_not_found();
            return Err(ResolveError::NotFound {
                lat: point.lat,
                lon: point.lon,
            });
        }

        let ascent = Ascent::new(
            self.snapshot.graph(),
            self.snapshot.boundaries(),
            &self.policy,
        );
        let mut warnings = Vec::new();

        let mut path = None;
        if let Some(hit) = &place_hit {
            let outcome = ascent.from_element(hit.place.id);
            warnings.extend(outcome.warnings);
            path = outcome.best.filter(|p| !p.is_empty());
        }
        if path.is_none() {
            let outcome = ascent.from_hops(point_anchor(), point_hops(&containing));
            warnings.extend(outcome.warnings);
            path = outcome.best;
        }
        let mut path = path.unwrap_or_default();

        if path.country.is_none() {
            if let Some(country) = self.country_of_state(&path) {
                debug!("country {} derived from state containment", country.id);
                path.country = Some(Ancestor::from_boundary(&country));
                path.country_derived = true;
            }
        }

        for warning in &warnings {
            diagnostics.record(warning);
        }

        let location = self.build_location(place_hit.as_ref(), &path);
        if location.city.is_none() && location.state.is_none() && location.country.is_none() {
            diagnostics.record_not_found();
            return Err(ResolveError::NotFound {
                lat: point.lat,
                lon: point.lon,
            });
        }

        diagnostics.record_resolution(
            location.city_approximate,
            location.country_derived_from_state,
        );

        Ok(Resolution { location, warnings })
    }

    /// Every boundary containing `point`, deepest level first, then smallest
    pub fn containing(&self, point: GeoPoint) -> Result<Vec<BoundaryMatch>, ResolveError> {
        if !point.is_valid() {
            return Err(ResolveError::InvalidInput {
                lat: point.lat,
                lon: point.lon,
            });
        }
        Ok(self
            .snapshot
            .index()
            .containing_point(point)
            .iter()
            .map(|b| BoundaryMatch {
                id: b.id,
                level: b.level,
                name: b.display_name(self.prefer_english).map(str::to_string),
                bbox_area: b.bbox_area(),
            })
            .collect())
    }

    /// Smallest country containing the path's state boundary
    fn country_of_state(&self, path: &AscentPath) -> Option<Arc<Boundary>> {
        let state = path.state.as_ref()?;
        let state = self.snapshot.boundary(state.id)?;
        self.snapshot
            .index()
            .containing_boundary_at_level(state, AdminLevel::COUNTRY)
    }

    fn build_location(&self, place_hit: Option<&PlaceHit>, path: &AscentPath) -> ResolvedLocation {
        let mut location = ResolvedLocation::default();

        if let Some(hit) = place_hit {
            location.city = Some(hit.place.display_name(self.prefer_english).to_string());
            location.city_id = Some(hit.place.id);
            location.distance_m = Some(hit.distance_m);
            location.city_approximate =
                self.policy.classify_place_distance(hit.distance_m) != PlaceMatch::Exact;
        }

        if let Some(state) = &path.state {
            location.state = self.name_of(state);
            location.state_id = Some(state.id);
        }

        if let Some(country) = &path.country {
            location.country = self.name_of(country);
            location.country_id = Some(country.id);
            location.country_code = self
                .snapshot
                .boundary(country.id)
                .and_then(|b| b.country_code())
                .map(str::to_string);
            location.country_derived_from_state = path.country_derived;
        }

        location
    }

    fn name_of(&self, ancestor: &Ancestor) -> Option<String> {
        self.snapshot
            .boundary(ancestor.id)
            .and_then(|b| b.display_name(self.prefer_english))
            .map(str::to_string)
            .or_else(|| ancestor.name.clone())
    }
}

/// Placeholder id for a query point on ascent paths
fn point_anchor() -> ElementId {
    ElementId::node(0)
}

/// Virtual first hops from a query point: the most specific containing
/// boundary at each level present. `containing` is ordered level descending,
/// most specific first within a level.
fn point_hops(containing: &[Arc<Boundary>]) -> Vec<Hop> {
    let mut hops: Vec<Hop> = Vec::new();
    let mut last_level = None;
    for boundary in containing {
        if last_level == Some(boundary.level) {
            continue;
        }
        last_level = Some(boundary.level);
        hops.push(Hop::to_boundary(boundary));
    }
    hops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;
    use crate::models::{Place, PlaceKind, RelationMember};
    use crate::store::MemoryStore;
    use geo::{polygon, MultiPolygon};

    fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min_lon, y: min_lat),
            (x: max_lon, y: min_lat),
            (x: max_lon, y: max_lat),
            (x: min_lon, y: max_lat),
            (x: min_lon, y: min_lat),
        ]])
    }

    fn boundary(id: i64, level: AdminLevel, name: &str, geometry: MultiPolygon<f64>) -> Boundary {
        Boundary::new(ElementId::relation(id), level, Some(name.to_string())).with_geometry(geometry)
    }

    fn resolver(boundaries: Vec<Boundary>, places: Vec<Place>) -> Resolver {
        let store = MemoryStore::new(boundaries, places);
        let snapshot = Snapshot::load(&store, &BuilderConfig::default()).unwrap();
        Resolver::new(Arc::new(snapshot), &ResolverConfig::default())
    }

    fn nested() -> Vec<Boundary> {
        let mut country = boundary(1, AdminLevel::COUNTRY, "Testland", rect(0.0, 0.0, 10.0, 10.0));
        country.tags.insert("ISO3166-1:alpha2".to_string(), "TL".to_string());
        country.members.push(RelationMember {
            member: ElementId::relation(2),
            role: "subarea".to_string(),
        });
        let state = boundary(2, AdminLevel::STATE, "North", rect(0.0, 5.0, 10.0, 10.0));
        vec![country, state]
    }

    #[test]
    fn test_point_anchor_without_places() {
        let resolver = resolver(nested(), vec![]);
        let loc = resolver.resolve(GeoPoint::new(7.0, 3.0)).unwrap();
        assert_eq!(loc.city, None);
        assert_eq!(loc.state.as_deref(), Some("North"));
        assert_eq!(loc.country.as_deref(), Some("Testland"));
        assert_eq!(loc.country_code.as_deref(), Some("TL"));
        assert!(loc.is_exact());
    }

    #[test]
    fn test_place_anchor() {
        let mut town = Place::new(
            ElementId::node(10),
            PlaceKind::Town,
            "Nordstadt",
            GeoPoint::new(7.0, 3.0),
        );
        town.name_en = Some("North Town".to_string());
        let resolver = resolver(nested(), vec![town]);

        let loc = resolver.resolve(GeoPoint::new(7.001, 3.001)).unwrap();
        assert_eq!(loc.city.as_deref(), Some("North Town"));
        assert_eq!(loc.city_id, Some(ElementId::node(10)));
        assert_eq!(loc.state_id, Some(ElementId::relation(2)));
        assert_eq!(loc.country_id, Some(ElementId::relation(1)));
        assert!(!loc.city_approximate);
        assert!(!loc.country_derived_from_state);
    }

    #[test]
    fn test_outside_state_has_country_only() {
        let resolver = resolver(nested(), vec![]);
        let loc = resolver.resolve(GeoPoint::new(2.0, 3.0)).unwrap();
        assert_eq!(loc.state, None);
        assert_eq!(loc.country.as_deref(), Some("Testland"));
        assert!(!loc.country_derived_from_state);
    }

    #[test]
    fn test_invalid_input() {
        let resolver = resolver(nested(), vec![]);
        assert_eq!(
            resolver.resolve(GeoPoint::new(91.0, 0.0)),
            Err(ResolveError::InvalidInput { lat: 91.0, lon: 0.0 })
        );
        assert!(resolver.resolve(GeoPoint::new(0.0, f64::NAN)).is_err());
        assert!(resolver.containing(GeoPoint::new(0.0, 181.0)).is_err());
    }

    #[test]
    fn test_only_unlabeled_levels_is_not_found() {
        let county = boundary(5, AdminLevel(6), "County", rect(0.0, 0.0, 1.0, 1.0));
        let resolver = resolver(vec![county], vec![]);
        assert!(matches!(
            resolver.resolve(GeoPoint::new(0.5, 0.5)),
            Err(ResolveError::NotFound { .. })
        ));
        assert_eq!(resolver.diagnostics().not_found_resolutions, 1);
    }

    #[test]
    fn test_cycle_counted_when_nothing_resolves() {
        let mut a = boundary(5, AdminLevel(6), "A", rect(0.0, 0.0, 2.0, 2.0));
        let mut b = boundary(6, AdminLevel(6), "B", rect(0.0, 0.0, 3.0, 3.0));
        a.members.push(RelationMember {
            member: b.id,
            role: "subarea".to_string(),
        });
        b.members.push(RelationMember {
            member: a.id,
            role: "subarea".to_string(),
        });
        let resolver = resolver(vec![a, b], vec![]);

        assert!(matches!(
            resolver.resolve_detailed(GeoPoint::new(1.0, 1.0)),
            Err(ResolveError::NotFound { .. })
        ));
        let diag = resolver.diagnostics();
        assert!(diag.cyclic_edges >= 1);
        assert_eq!(diag.not_found_resolutions, 1);
    }

    #[test]
    fn test_containing_listing_order() {
        let resolver = resolver(nested(), vec![]);
        let matches = resolver.containing(GeoPoint::new(7.0, 3.0)).unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![ElementId::relation(2), ElementId::relation(1)]);
        assert_eq!(matches[0].level, AdminLevel::STATE);
    }

    #[test]
    fn test_batch_keeps_order() {
        let resolver = resolver(nested(), vec![]);
        let points = vec![
            GeoPoint::new(7.0, 3.0),
            GeoPoint::new(-40.0, -40.0),
            GeoPoint::new(2.0, 3.0),
            GeoPoint::new(100.0, 0.0),
        ];
        let results = resolver.resolve_batch(&points);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().state.as_deref(), Some("North"));
        assert!(matches!(results[1], Err(ResolveError::NotFound { .. })));
        assert_eq!(results[2].as_ref().unwrap().state, None);
        assert!(matches!(results[3], Err(ResolveError::InvalidInput { .. })));

        let diag = resolver.diagnostics();
        assert_eq!(diag.resolutions, 3);
        assert_eq!(diag.not_found_resolutions, 1);
    }
}
