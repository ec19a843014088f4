//! Fallback and approximation policy.
//!
//! Every heuristic the resolver applies lives here: the nearest-place radius,
//! the same-level overlap tie-break, ascent-path ranking and derived-country
//! substitution. The resolver only sequences them.

use std::cmp::Ordering;

use crate::config::ResolverConfig;
use crate::models::{Boundary, ElementId};

/// How a place match relates to the query point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceMatch {
    /// Within the exact tolerance
    Exact,
    /// Beyond the exact tolerance but inside the search radius
    Approximate,
    /// Outside the search radius
    OutOfRange,
}

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    pub search_radius_m: f64,
    pub exact_tolerance_m: f64,
    pub max_ascent_depth: usize,
    pub max_ascent_paths: usize,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl FallbackPolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            search_radius_m: config.search_radius_m,
            exact_tolerance_m: config.exact_tolerance_m,
            max_ascent_depth: config.max_ascent_depth,
            max_ascent_paths: config.max_ascent_paths,
        }
    }

    pub fn classify_place_distance(&self, distance_m: f64) -> PlaceMatch {
        if distance_m > self.search_radius_m {
            PlaceMatch::OutOfRange
        } else if distance_m > self.exact_tolerance_m {
            PlaceMatch::Approximate
        } else {
            PlaceMatch::Exact
        }
    }
}

/// Order two boundaries by specificity: smaller bbox area first, then named
/// before unnamed, then by id so the order is total.
///
/// Boundaries without geometry sort after any boundary with geometry.
pub fn compare_specificity(a: &Boundary, b: &Boundary) -> Ordering {
    compare_area(a.bbox_area(), b.bbox_area())
        .then_with(|| b.has_name().cmp(&a.has_name()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Smaller area first; missing area last
pub(crate) fn compare_area(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Summary of one ascent path used for ranking
#[derive(Debug, Clone, PartialEq)]
pub struct PathRank {
    pub has_country: bool,
    pub has_state: bool,
    pub state_area: Option<f64>,
    pub country_derived: bool,
    pub country_area: Option<f64>,
    /// (state id, country id) ordering key for determinism
    pub tiebreak: (Option<ElementId>, Option<ElementId>),
}

/// Rank ascent paths: reaching a country first, then having a state, then the
/// smallest state, then an exact country over a derived one,
/// then the smallest country, then ids.
pub fn compare_paths(a: &PathRank, b: &PathRank) -> Ordering {
    b.has_country
        .cmp(&a.has_country)
        .then_with(|| b.has_state.cmp(&a.has_state))
        .then_with(|| compare_area(a.state_area, b.state_area))
        .then_with(|| a.country_derived.cmp(&b.country_derived))
        .then_with(|| compare_area(a.country_area, b.country_area))
        .then_with(|| a.tiebreak.cmp(&b.tiebreak))
}
