//! In-memory hierarchy graph and its CSV persistence.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::GraphIoError;
use crate::models::{AdminLevel, EdgeSource, ElementId, ElementKind, HierarchyEdge};

/// Immutable edge set indexed by child for ascent.
#[derive(Debug, Default)]
pub struct HierarchyGraph {
    edges: Vec<HierarchyEdge>,
    parents: HashMap<ElementId, Vec<usize>>,
}

impl HierarchyGraph {
    pub fn from_edges(edges: Vec<HierarchyEdge>) -> Self {
        let mut parents: HashMap<ElementId, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            parents.entry(edge.child).or_default().push(i);
        }
        Self { edges, parents }
    }

    /// Edges whose child is `id`
    pub fn parents_of(&self, id: ElementId) -> impl Iterator<Item = &HierarchyEdge> {
        self.parents
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    pub fn edges(&self) -> &[HierarchyEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), GraphIoError> {
        let path = path.as_ref();
        let csv_err = |source| GraphIoError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for edge in &self.edges {
            writer.serialize(EdgeRecord::from(edge)).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| GraphIoError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Wrote {} hierarchy edges to {}", self.edges.len(), path.display());
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self, GraphIoError> {
        let path = path.as_ref();
        let csv_err = |source| GraphIoError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let mut edges = Vec::new();
        for record in reader.deserialize::<EdgeRecord>() {
            edges.push(record.map_err(csv_err)?.into());
        }

        info!("Read {} hierarchy edges from {}", edges.len(), path.display());
        Ok(Self::from_edges(edges))
    }
}

/// Flat row layout of a persisted edge
#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    parent_kind: ElementKind,
    parent_id: i64,
    parent_level: AdminLevel,
    parent_name: Option<String>,
    child_kind: ElementKind,
    child_id: i64,
    child_level: Option<AdminLevel>,
    child_name: Option<String>,
    role: String,
    source: EdgeSource,
}

impl From<&HierarchyEdge> for EdgeRecord {
    fn from(edge: &HierarchyEdge) -> Self {
        Self {
            parent_kind: edge.parent.kind,
            parent_id: edge.parent.id,
            parent_level: edge.parent_level,
            parent_name: edge.parent_name.clone(),
            child_kind: edge.child.kind,
            child_id: edge.child.id,
            child_level: edge.child_level,
            child_name: edge.child_name.clone(),
            role: edge.role.clone(),
            source: edge.source,
        }
    }
}

impl From<EdgeRecord> for HierarchyEdge {
    fn from(record: EdgeRecord) -> Self {
        Self {
            parent: ElementId::new(record.parent_kind, record.parent_id),
            parent_level: record.parent_level,
            parent_name: record.parent_name,
            child: ElementId::new(record.child_kind, record.child_id),
            child_level: record.child_level,
            child_name: record.child_name,
            role: record.role,
            source: record.source,
        }
    }
}
