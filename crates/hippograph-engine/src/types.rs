//! Report and result types returned by the engine.

use serde::{Deserialize, Serialize};

use hippograph_core::Triple;
use hippograph_store::GraphStats;

/// How a query's passages were ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Personalized PageRank over the knowledge graph.
    Graph,
    /// Dense passage similarity only; no facts survived reranking.
    Dense,
    /// Nothing to seed the graph walk with.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub content: String,
    pub score: f64,
}

/// Ranked passages for one query plus the facts that seeded the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySolution {
    pub question: String,
    pub docs: Vec<RetrievedPassage>,
    pub facts: Vec<Triple>,
    pub mode: RetrievalMode,
}

impl QuerySolution {
    pub fn doc_ids(&self) -> Vec<&str> {
        self.docs.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn doc_scores(&self) -> Vec<f64> {
        self.docs.iter().map(|d| d.score).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub chunks_submitted: usize,
    pub chunks_inserted: usize,
    pub chunks_extracted: usize,
    pub new_graph_chunks: usize,
    pub entities_inserted: usize,
    pub facts_inserted: usize,
    pub synonymy_edges: usize,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub chunks_requested: usize,
    pub chunks_removed: usize,
    pub records_removed: usize,
    pub entities_removed: usize,
    pub facts_removed: usize,
    pub vertices_removed: usize,
    pub edges_forgotten: usize,
    /// Co-occurrence edges between surviving entities lowered or dropped.
    pub edges_reweighted: usize,
}

/// Counts across stores, graph and caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub chunks: usize,
    pub entities: usize,
    pub facts: usize,
    pub extraction_records: usize,
    pub accumulated_edges: usize,
    pub graph: GraphStats,
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
}
