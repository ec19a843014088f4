//! Element identifiers, geographic points and place records.

use geo::Point;
use serde::{Deserialize, Serialize};

/// Type of map element a record was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Node => write!(f, "node"),
            ElementKind::Way => write!(f, "way"),
            ElementKind::Relation => write!(f, "relation"),
        }
    }
}

/// Source identifier: element kind plus numeric id.
///
/// Ordered by kind first so that sorting is stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    pub kind: ElementKind,
    pub id: i64,
}

impl ElementId {
    pub fn new(kind: ElementKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn node(id: i64) -> Self {
        Self::new(ElementKind::Node, id)
    }

    pub fn way(id: i64) -> Self {
        Self::new(ElementKind::Way, id)
    }

    pub fn relation(id: i64) -> Self {
        Self::new(ElementKind::Relation, id)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both coordinates are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Convert to a `geo` point (x = lon, y = lat)
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<Point<f64>> for GeoPoint {
    fn from(p: Point<f64>) -> Self {
        Self { lat: p.y(), lon: p.x() }
    }
}

/// Settlement classification from the `place=*` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaceKind {
    City,
    Town,
    Village,
    Hamlet,
    Suburb,
    Other(String),
}

impl PlaceKind {
    pub fn from_tag(value: &str) -> Self {
        match value {
            "city" => PlaceKind::City,
            "town" => PlaceKind::Town,
            "village" => PlaceKind::Village,
            "hamlet" => PlaceKind::Hamlet,
            "suburb" | "neighbourhood" | "quarter" => PlaceKind::Suburb,
            other => PlaceKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlaceKind::City => "city",
            PlaceKind::Town => "town",
            PlaceKind::Village => "village",
            PlaceKind::Hamlet => "hamlet",
            PlaceKind::Suburb => "suburb",
            PlaceKind::Other(s) => s,
        }
    }
}

/// A point-located named settlement.
#[derive(Debug, Clone)]
pub struct Place {
    pub id: ElementId,
    pub kind: PlaceKind,
    pub name: String,
    pub name_en: Option<String>,
    pub population: Option<u64>,
    pub location: GeoPoint,
}

impl Place {
    pub fn new(id: ElementId, kind: PlaceKind, name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            name_en: None,
            population: None,
            location,
        }
    }

    /// Name for output, preferring English when asked and available
    pub fn display_name(&self, prefer_english: bool) -> &str {
        match (&self.name_en, prefer_english) {
            (Some(en), true) if !en.is_empty() => en,
            _ => &self.name,
        }
    }
}
