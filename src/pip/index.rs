//! Spatial index for fast admin boundary lookups.

use geo::{Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::geometry::representative_point;
use crate::models::{AdminLevel, Boundary, GeoPoint};
use crate::policy::compare_specificity;

/// Wrapper for R-tree indexing of admin boundaries
#[derive(Clone)]
pub struct IndexedBoundary {
    pub boundary: Arc<Boundary>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    /// `None` for boundaries without geometry
    pub fn new(boundary: Arc<Boundary>) -> Option<Self> {
        let rect = boundary.bbox()?;
        Some(Self {
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            boundary,
        })
    }
}

/// Spatial index over boundaries that carry geometry.
///
/// Queries run in two phases: envelope intersection on the R-tree, then
/// exact point-in-polygon on the survivors. Immutable once built.
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
    by_level: BTreeMap<AdminLevel, usize>,
    skipped: usize,
}

impl BoundaryIndex {
    /// Build spatial index from admin boundaries
    pub fn build<I>(boundaries: I) -> Self
    where
        I: IntoIterator<Item = Arc<Boundary>>,
    {
        let mut skipped = 0;
        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .filter_map(|b| {
                let ib = IndexedBoundary::new(b);
                if ib.is_none() {
                    skipped += 1;
                }
                ib
            })
            .collect();

        info!(
            "Building spatial index for {} boundaries ({} without geometry skipped)...",
            indexed.len(),
            skipped
        );

        let mut by_level: BTreeMap<AdminLevel, usize> = BTreeMap::new();
        for ib in &indexed {
            *by_level.entry(ib.boundary.level).or_default() += 1;
        }

        let tree = RTree::bulk_load(indexed);

        info!("Spatial index built with {} entries", tree.size());
        for (level, count) in &by_level {
            info!("  level {}: {} boundaries", level, count);
        }

        Self {
            tree,
            by_level,
            skipped,
        }
    }

    fn candidates(&self, point: Point<f64>) -> impl Iterator<Item = &Arc<Boundary>> + '_ {
        let query_envelope = AABB::from_point([point.x(), point.y()]);

        // Use R-tree to get candidates via envelope intersection, then filter with exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(move |ib| {
                ib.boundary
                    .geometry
                    .as_ref()
                    .is_some_and(|g| g.contains(&point))
            })
            .map(|ib| &ib.boundary)
    }

    /// Find all admin boundaries containing a point, most specific first
    pub fn containing_point(&self, point: GeoPoint) -> Vec<Arc<Boundary>> {
        let mut found: Vec<Arc<Boundary>> = self
            .candidates(point.to_point())
            .map(Arc::clone)
            .collect();
        found.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| compare_specificity(a, b))
        });
        found
    }

    /// Most specific boundary at `level` containing a point
    pub fn containing_point_at_level(
        &self,
        point: GeoPoint,
        level: AdminLevel,
    ) -> Option<Arc<Boundary>> {
        self.candidates(point.to_point())
            .filter(|b| b.level == level)
            .min_by(|a, b| compare_specificity(a, b))
            .map(Arc::clone)
    }

    /// All boundaries other than `boundary` that contain its representative point
    pub fn containing_boundary(&self, boundary: &Boundary) -> Vec<Arc<Boundary>> {
        let Some(point) = boundary.geometry.as_ref().and_then(representative_point) else {
            return Vec::new();
        };
        let mut found: Vec<Arc<Boundary>> = self
            .candidates(point)
            .filter(|b| b.id != boundary.id)
            .map(Arc::clone)
            .collect();
        found.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then_with(|| compare_specificity(a, b))
        });
        found
    }

    /// Most specific boundary at `level` containing `boundary`'s representative point
    pub fn containing_boundary_at_level(
        &self,
        boundary: &Boundary,
        level: AdminLevel,
    ) -> Option<Arc<Boundary>> {
        let point = boundary.geometry.as_ref().and_then(representative_point)?;
        self.candidates(point)
            .filter(|b| b.level == level && b.id != boundary.id)
            .min_by(|a, b| compare_specificity(a, b))
            .map(Arc::clone)
    }

    /// Number of indexed boundaries at a level
    pub fn count_at_level(&self, level: AdminLevel) -> usize {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    /// Boundaries passed to `build` that had no geometry
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Get total number of indexed boundaries
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterate over all indexed boundaries
    pub fn boundaries(&self) -> impl Iterator<Item = &Arc<Boundary>> {
        self.tree.iter().map(|ib| &ib.boundary)
    }
}
