//! Newline-delimited JSON geometry store.

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{GeometryStore, MemoryStore};
use crate::error::{DataIntegrityWarning, StoreError};
use crate::models::{
    AdminLevel, Boundary, ElementId, ElementKind, GeoPoint, Place, PlaceKind, RelationMember,
};
use crate::pip::{multipolygon_from_geojson, sanitize_multipolygon};

#[derive(Debug, Deserialize)]
struct BoundaryRecord {
    #[serde(default = "default_boundary_kind")]
    kind: ElementKind,
    id: i64,
    admin_level: u8,
    name: Option<String>,
    name_en: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    members: Vec<MemberRecord>,
    #[serde(default)]
    geometry: Option<geojson::Geometry>,
}

#[derive(Debug, Deserialize)]
struct MemberRecord {
    kind: ElementKind,
    id: i64,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    #[serde(default = "default_place_kind")]
    kind: ElementKind,
    id: i64,
    place: String,
    name: String,
    name_en: Option<String>,
    population: Option<u64>,
    lat: f64,
    lon: f64,
}

fn default_boundary_kind() -> ElementKind {
    ElementKind::Relation
}

fn default_place_kind() -> ElementKind {
    ElementKind::Node
}

/// Geometry store loaded eagerly from two NDJSON files (optionally gzipped).
pub struct NdjsonStore {
    inner: MemoryStore,
}

impl NdjsonStore {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        boundaries: P,
        places: Q,
    ) -> Result<Self, StoreError> {
        let mut inner = MemoryStore::default();

        let boundaries = boundaries.as_ref();
        info!("Loading boundaries from {}", boundaries.display());
        for_each_record(boundaries, |record: BoundaryRecord| {
            let (boundary, warnings) = boundary_from_record(record);
            for warning in warnings {
                inner.push_warning(warning);
            }
            inner.insert_boundary(boundary);
        })?;

        let places = places.as_ref();
        info!("Loading places from {}", places.display());
        for_each_record(places, |record: PlaceRecord| {
            inner.insert_place(place_from_record(record));
        })?;

        info!(
            "Loaded {} boundaries and {} places",
            inner.boundary_count(),
            inner.place_count()
        );

        Ok(Self { inner })
    }
}

impl GeometryStore for NdjsonStore {
    fn all_boundaries(&self) -> Result<Vec<Arc<Boundary>>, StoreError> {
        self.inner.all_boundaries()
    }

    fn all_places(&self) -> Result<Vec<Arc<Place>>, StoreError> {
        self.inner.all_places()
    }

    fn boundary_by_id(&self, id: ElementId) -> Result<Arc<Boundary>, StoreError> {
        self.inner.boundary_by_id(id)
    }

    fn load_warnings(&self) -> Vec<DataIntegrityWarning> {
        self.inner.load_warnings()
    }
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

fn for_each_record<T, F>(path: &Path, mut f: F) -> Result<(), StoreError>
where
    T: for<'de> Deserialize<'de>,
    F: FnMut(T),
{
    let reader = open_reader(path)?;
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        f(record);
    }
    Ok(())
}

fn boundary_from_record(record: BoundaryRecord) -> (Boundary, Vec<DataIntegrityWarning>) {
    let id = ElementId::new(record.kind, record.id);
    let mut warnings = Vec::new();

    let mut boundary = Boundary::new(id, AdminLevel(record.admin_level), record.name);
    boundary.name_en = record
        .name_en
        .or_else(|| record.tags.get("name:en").cloned());
    boundary.tags = record.tags;
    boundary.members = record
        .members
        .into_iter()
        .map(|m| RelationMember {
            member: ElementId::new(m.kind, m.id),
            role: m.role,
        })
        .collect();

    if let Some(geometry) = record.geometry.as_ref().and_then(multipolygon_from_geojson) {
        let sanitized = sanitize_multipolygon(geometry);
        for _ in 0..sanitized.dropped_rings {
            warnings.push(DataIntegrityWarning::InvalidRing { boundary: id });
        }
        boundary.geometry = sanitized.geometry;
    }

    (boundary, warnings)
}

fn place_from_record(record: PlaceRecord) -> Place {
    let mut place = Place::new(
        ElementId::new(record.kind, record.id),
        PlaceKind::from_tag(&record.place),
        record.name,
        GeoPoint::new(record.lat, record.lon),
    );
    place.name_en = record.name_en;
    place.population = record.population;
    place
}
