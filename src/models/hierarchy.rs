//! Hierarchy edges and resolver output.

use serde::{Deserialize, Serialize};

use super::{AdminLevel, ElementId};

/// Role label used on edges derived from spatial containment
pub const CONTAINS_ROLE: &str = "contains";

/// How an edge entered the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSource {
    /// Relation membership declared in the source data
    Explicit,
    /// Smallest enclosing boundary found by the spatial index
    Derived,
}

/// Directed parent -> child link between a boundary and a sub-boundary or place.
///
/// Parent and child names are denormalized for fast reads. `child_level` is
/// `None` for places and for members not yet backfilled.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyEdge {
    pub parent: ElementId,
    pub parent_level: AdminLevel,
    pub parent_name: Option<String>,
    pub child: ElementId,
    pub child_level: Option<AdminLevel>,
    pub child_name: Option<String>,
    pub role: String,
    pub source: EdgeSource,
}

impl HierarchyEdge {
    pub fn is_derived(&self) -> bool {
        self.source == EdgeSource::Derived
    }

    /// Parent is a smaller region than its boundary child (data noise)
    pub fn is_inverted(&self) -> bool {
        self.child_level
            .is_some_and(|child| child.is_above(self.parent_level))
    }
}

/// Best-effort city/state/country answer for a point.
///
/// Each approximation flag is independent: `city_approximate` marks a
/// nearest-neighbour place match beyond the exact tolerance,
/// `country_derived_from_state` marks a country found by containment of the
/// resolved state instead of the anchor itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<ElementId>,

    /// Great-circle distance to the matched place, metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,

    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<ElementId>,

    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_id: Option<ElementId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    pub city_approximate: bool,

    pub country_derived_from_state: bool,
}

impl ResolvedLocation {
    pub fn is_exact(&self) -> bool {
        !self.city_approximate && !self.country_derived_from_state
    }
}
