//! Administrative boundary types.

use geo::{BoundingRect, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ElementId;

/// OSM `admin_level` value.
///
/// Lower numbers are larger regions. Only levels 2 and 4 carry a role in
/// resolution; every other level passes through unlabeled.
/// See: https://wiki.openstreetmap.org/wiki/Tag:boundary%3Dadministrative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminLevel(pub u8);

/// Role a level plays in a resolved location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelRole {
    /// Country (admin_level=2)
    Country,
    /// Region / state / province (admin_level=4)
    State,
}

impl AdminLevel {
    pub const COUNTRY: AdminLevel = AdminLevel(2);
    pub const STATE: AdminLevel = AdminLevel(4);

    /// Distinguished levels, largest first
    pub fn distinguished() -> &'static [AdminLevel] {
        &[AdminLevel::COUNTRY, AdminLevel::STATE]
    }

    pub fn role(&self) -> Option<LevelRole> {
        match self.0 {
            2 => Some(LevelRole::Country),
            4 => Some(LevelRole::State),
            _ => None,
        }
    }

    /// True when `self` is a strictly larger region than `other`
    pub fn is_above(&self, other: AdminLevel) -> bool {
        self.0 < other.0
    }
}

impl std::fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A member reference of a boundary relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMember {
    pub member: ElementId,
    /// Declared role, e.g. "subarea", "admin_centre", "outer"
    pub role: String,
}

/// A named administrative region.
///
/// `geometry` is `None` when the source geometry was missing or could not be
/// repaired; such boundaries stay addressable by id but never match a
/// containment query.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub id: ElementId,
    pub level: AdminLevel,
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub tags: HashMap<String, String>,
    pub members: Vec<RelationMember>,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl Boundary {
    pub fn new(id: ElementId, level: AdminLevel, name: Option<String>) -> Self {
        Self {
            id,
            level,
            name,
            name_en: None,
            tags: HashMap::new(),
            members: Vec::new(),
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: MultiPolygon<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Get the bounding rectangle of this boundary
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.geometry.as_ref()?.bounding_rect()
    }

    /// Bounding-box area in square degrees, the specificity measure for tie-breaks
    pub fn bbox_area(&self) -> Option<f64> {
        self.bbox().map(|rect| rect.width() * rect.height())
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Name for output, preferring English when asked and available
    pub fn display_name(&self, prefer_english: bool) -> Option<&str> {
        let en = self.name_en.as_deref().filter(|n| !n.is_empty());
        let native = self.name.as_deref().filter(|n| !n.is_empty());
        if prefer_english {
            en.or(native)
        } else {
            native.or(en)
        }
    }

    /// ISO 3166-1 alpha-2 code, if tagged
    pub fn country_code(&self) -> Option<&str> {
        self.tags
            .get("ISO3166-1:alpha2")
            .or_else(|| self.tags.get("ISO3166-1"))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: min, y: min),
            (x: max, y: min),
            (x: max, y: max),
            (x: min, y: max),
            (x: min, y: min),
        ]])
    }

    #[test]
    fn test_level_roles() {
        assert_eq!(AdminLevel(2).role(), Some(LevelRole::Country));
        assert_eq!(AdminLevel(4).role(), Some(LevelRole::State));
        assert_eq!(AdminLevel(6).role(), None);
        assert!(AdminLevel::COUNTRY.is_above(AdminLevel::STATE));
        assert!(!AdminLevel::STATE.is_above(AdminLevel::STATE));
    }

    #[test]
    fn test_bbox_area() {
        let b = Boundary::new(ElementId::relation(1), AdminLevel::STATE, None)
            .with_geometry(square(0.0, 2.0));
        assert_eq!(b.bbox_area(), Some(4.0));

        let empty = Boundary::new(ElementId::relation(2), AdminLevel::STATE, None);
        assert_eq!(empty.bbox_area(), None);
    }

    #[test]
    fn test_country_code_fallback() {
        let mut b = Boundary::new(
            ElementId::relation(51477),
            AdminLevel::COUNTRY,
            Some("Deutschland".to_string()),
        );
        assert_eq!(b.country_code(), None);
        b.tags.insert("ISO3166-1".to_string(), "DE".to_string());
        assert_eq!(b.country_code(), Some("DE"));
        b.tags
            .insert("ISO3166-1:alpha2".to_string(), "DE".to_string());
        assert_eq!(b.country_code(), Some("DE"));
    }

    #[test]
    fn test_display_name() {
        let mut b = Boundary::new(
            ElementId::relation(51477),
            AdminLevel::COUNTRY,
            Some("Deutschland".to_string()),
        );
        b.name_en = Some("Germany".to_string());
        assert_eq!(b.display_name(true), Some("Germany"));
        assert_eq!(b.display_name(false), Some("Deutschland"));

        let unnamed = Boundary::new(ElementId::way(9), AdminLevel(6), Some(String::new()));
        assert!(!unnamed.has_name());
        assert_eq!(unnamed.display_name(true), None);
    }
}
