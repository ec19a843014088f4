//! Error taxonomy for store access, snapshot loading and resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{AdminLevel, ElementId};

/// Per-request resolution failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Coordinate outside WGS84 bounds or not finite
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidInput { lat: f64, lon: f64 },

    /// No place or boundary covers the point
    #[error("no coverage for lat={lat}, lon={lon}")]
    NotFound { lat: f64, lon: f64 },
}

/// Geometry store read failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found in geometry store")]
    NotFound(ElementId),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A snapshot could not be built; any previously loaded snapshot keeps serving
#[derive(Debug, Error)]
pub enum SnapshotLoadFailure {
    #[error("geometry store unreadable")]
    Store(#[from] StoreError),

    #[error("geometry store is empty: {boundaries} boundaries with geometry, {places} places")]
    Empty { boundaries: usize, places: usize },

    #[error("persisted hierarchy unreadable")]
    Graph(#[from] GraphIoError),
}

/// Hierarchy edge persistence failures
#[derive(Debug, Error)]
pub enum GraphIoError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed edge record in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Non-fatal data problems. Recorded in diagnostics, never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataIntegrityWarning {
    /// Relation member id absent from the store
    DanglingMember { parent: ElementId, member: ElementId },
    /// Boundary without usable geometry
    NullGeometry { boundary: ElementId },
    /// Ring dropped while sanitizing a polygon
    InvalidRing { boundary: ElementId },
    /// Parent level numerically greater than the child's
    InvertedEdge {
        parent: ElementId,
        parent_level: AdminLevel,
        child: ElementId,
        child_level: AdminLevel,
    },
    /// Ascent revisited a node already on the current path
    CyclicEdge { from: ElementId, to: ElementId },
    /// Ascent hit the depth guard
    AscentDepthExceeded { start: ElementId, depth: usize },
    /// Ascent ran out of paths or steps with hops still queued
    AscentBudgetExhausted { start: ElementId, pending: usize },
    /// Place with coordinates outside WGS84, left out of the place index
    InvalidPlace { place: ElementId },
}

impl std::fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingMember { parent, member } => {
                write!(f, "{parent} references missing member {member}")
            }
            Self::NullGeometry { boundary } => write!(f, "{boundary} has no geometry"),
            Self::InvalidRing { boundary } => write!(f, "{boundary} has a degenerate ring"),
            Self::InvertedEdge {
                parent,
                parent_level,
                child,
                child_level,
            } => write!(
                f,
                "{parent} (level {parent_level}) is parent of larger {child} (level {child_level})"
            ),
            Self::CyclicEdge { from, to } => write!(f, "cycle in hierarchy: {from} -> {to}"),
            Self::AscentDepthExceeded { start, depth } => {
                write!(f, "ascent from {start} exceeded depth {depth}")
            }
            Self::AscentBudgetExhausted { start, pending } => {
                write!(f, "ascent from {start} stopped with {pending} hops unexplored")
            }
            Self::InvalidPlace { place } => write!(f, "{place} has invalid coordinates"),
        }
    }
}
