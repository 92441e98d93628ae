//! Store and graph data types.

use serde::{Deserialize, Serialize};

use hippograph_core::NodeKind;

/// A row in an embedding store: content-addressed id plus its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub id: String,
    pub content: String,
}

impl StoreDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// A nearest-neighbor hit with its cosine similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: StoreDocument,
    pub score: f64,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStat {
    pub namespace: String,
    pub count: usize,
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub content: String,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
        }
    }
}

/// A weighted graph edge between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }
}

/// Parameters for one personalized PageRank run.
#[derive(Debug, Clone)]
pub struct PprParams {
    /// Teleport weights, one per vertex in `GraphEngine::node_ids` order.
    pub reset: Vec<f64>,
    pub damping: f64,
    pub directed: bool,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Graph statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
    pub entity_nodes: usize,
    pub passage_nodes: usize,
    pub fact_nodes: usize,
    pub density: f64,
    pub memory_usage_bytes: usize,
}
