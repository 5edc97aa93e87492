//! Snapshot contract with the storage collaborator
//!
//! A deal is exchanged as one record per node plus the `{kind, from, to}`
//! edge table. The fingerprint covers nodes and edges only, so a storage
//! layer can prove it round-tripped the graph exactly.

use crate::engine::HistoryEntry;
use crate::graph::{DealId, Edge, GraphError, GraphStore, Node, NodeKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("Snapshot for {expected} holds deal node {found:?}")]
    DealMismatch {
        expected: DealId,
        found: Option<DealId>,
    },

    #[error("Snapshot holds {0} deal nodes")]
    MultipleDeals(usize),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub deal: DealId,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl GraphSnapshot {
    /// Capture a store in insertion order
    pub fn capture(deal: &DealId, store: &GraphStore, history: Vec<HistoryEntry>) -> Self {
        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            deal: deal.clone(),
            nodes: store.nodes().cloned().collect(),
            edges: store.edges().cloned().collect(),
            history,
        }
    }

    /// Rebuild the graph. Structural checks only; acyclicity and the rollup
    /// are the engine's concern.
    pub fn restore(&self) -> Result<GraphStore, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }

        let mut store = GraphStore::new();
        for node in &self.nodes {
            store.add_node(node.clone())?;
        }

        let deals = store.ids_of_kind(NodeKind::Deal).len();
        if deals > 1 {
            return Err(SnapshotError::MultipleDeals(deals));
        }
        let found = store.deal().map(|deal| deal.id.clone());
        if found.as_ref() != Some(&self.deal) {
            return Err(SnapshotError::DealMismatch {
                expected: self.deal.clone(),
                found,
            });
        }

        for edge in &self.edges {
            store.add_edge(edge.kind, edge.from.clone(), edge.to.clone())?;
        }
        Ok(store)
    }

    /// SHA-256 over the canonical JSON of nodes and edges, hex encoded
    pub fn fingerprint(&self) -> Result<String, SnapshotError> {
        let mut hasher = Sha256::new();
        let nodes = serde_json::to_vec(&self.nodes)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        let edges = serde_json::to_vec(&self.edges)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        hasher.update(&nodes);
        hasher.update(b"\n");
        hasher.update(&edges);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(text).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }
}
