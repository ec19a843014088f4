//! Nearest-place lookup over place points.

use geo::{Distance, Haversine};
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{GeoPoint, Place};

/// Mean metres per degree of latitude
const METERS_PER_DEGREE: f64 = 111_195.0;

type PlacePoint = GeomWithData<[f64; 2], usize>;

/// A place found near a query point
#[derive(Debug, Clone)]
pub struct PlaceHit {
    pub place: Arc<Place>,
    pub distance_m: f64,
}

/// R-tree over place points, queried by great-circle radius
pub struct PlaceIndex {
    tree: RTree<PlacePoint>,
    places: Vec<Arc<Place>>,
    skipped: usize,
}

impl PlaceIndex {
    pub fn build<I>(places: I) -> Self
    where
        I: IntoIterator<Item = Arc<Place>>,
    {
        let (places, invalid): (Vec<Arc<Place>>, Vec<Arc<Place>>) = places
            .into_iter()
            .partition(|p| p.location.is_valid());
        if !invalid.is_empty() {
            warn!("Skipping {} places with invalid coordinates", invalid.len());
        }

        info!("Building place index for {} places...", places.len());

        let points: Vec<PlacePoint> = places
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.location.lon, p.location.lat], i))
            .collect();

        Self {
            tree: RTree::bulk_load(points),
            places,
            skipped: invalid.len(),
        }
    }

    /// Nearest place within `radius_m` metres of `point`.
    ///
    /// Candidates come from a degree envelope wide enough to cover the radius
    /// (split at the antimeridian), then are ranked by haversine distance.
    /// Ties prefer the larger population, then the lower id.
    pub fn nearest_within(&self, point: GeoPoint, radius_m: f64) -> Option<PlaceHit> {
        let mut best: Option<PlaceHit> = None;

        for envelope in search_envelopes(point, radius_m) {
            for candidate in self.tree.locate_in_envelope(&envelope) {
                let place = &self.places[candidate.data];
                let distance = distance_m(point, place.location);
                if distance > radius_m {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => compare_hits(distance, place, current) == Ordering::Less,
                };
                if better {
                    best = Some(PlaceHit {
                        place: Arc::clone(place),
                        distance_m: distance,
                    });
                }
            }
        }

        best
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Places left out for coordinates outside WGS84
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn places(&self) -> impl Iterator<Item = &Arc<Place>> {
        self.places.iter()
    }
}

fn compare_hits(distance_m: f64, place: &Place, current: &PlaceHit) -> Ordering {
    distance_m
        .total_cmp(&current.distance_m)
        .then_with(|| {
            current
                .place
                .population
                .unwrap_or(0)
                .cmp(&place.population.unwrap_or(0))
        })
        .then_with(|| place.id.cmp(&current.place.id))
}

/// Degree envelopes covering a great-circle radius around `point`
fn search_envelopes(point: GeoPoint, radius_m: f64) -> Vec<AABB<[f64; 2]>> {
    let dlat = radius_m / METERS_PER_DEGREE;
    let min_lat = (point.lat - dlat).max(-90.0);
    let max_lat = (point.lat + dlat).min(90.0);

    // Widest parallel within the band decides the longitude span
    let widest = min_lat.abs().max(max_lat.abs());
    let cos = widest.to_radians().cos();
    let dlon = if cos <= f64::EPSILON || min_lat <= -90.0 || max_lat >= 90.0 {
        180.0
    } else {
        (dlat / cos).min(180.0)
    };

    if dlon >= 180.0 {
        return vec![AABB::from_corners([-180.0, min_lat], [180.0, max_lat])];
    }

    let west = point.lon - dlon;
    let east = point.lon + dlon;
    let mut envelopes = vec![AABB::from_corners(
        [west.max(-180.0), min_lat],
        [east.min(180.0), max_lat],
    )];
    if west < -180.0 {
        envelopes.push(AABB::from_corners([west + 360.0, min_lat], [180.0, max_lat]));
    }
    if east > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, min_lat], [east - 360.0, max_lat]));
    }
    envelopes
}

/// Great-circle distance between two points, metres
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    Haversine.distance(a.to_point(), b.to_point())
}
