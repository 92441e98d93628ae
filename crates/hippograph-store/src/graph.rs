//! Knowledge graph backend using petgraph.
//!
//! Vertices are keyed by content-addressed node id. Vertex positions
//! (`node_ids()` order) are the indices personalized PageRank scores are
//! reported in; they are only stable until the next mutation.

use std::collections::HashMap;
use std::path::Path;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hippograph_core::{Error, NodeKind, Result};

use crate::pagerank::{build_adjacency, personalized_pagerank};
use crate::types::{GraphEdge, GraphNode, GraphStats, PprParams};

/// Graph storage and traversal primitive consumed by the indexer and retriever.
pub trait GraphEngine: Send + Sync {
    /// Add vertices whose id is not present yet. Returns the number added.
    fn add_vertices(&mut self, nodes: Vec<GraphNode>) -> usize;

    /// Insert edges, or update the weight of an existing `(source, target)`
    /// edge. Edges with a missing endpoint are skipped. Returns the number
    /// of newly inserted edges.
    fn add_edges(&mut self, edges: Vec<GraphEdge>) -> usize;

    /// Remove vertices (and their edges). Unknown ids are ignored.
    fn delete_vertices(&mut self, ids: &[String]) -> usize;

    fn has_node(&self, id: &str) -> bool;

    /// Vertex ids in position order.
    fn node_ids(&self) -> Vec<String>;

    fn node(&self, id: &str) -> Option<GraphNode>;

    fn edge_weight(&self, source: &str, target: &str) -> Option<f64>;

    /// Every stored edge with its weight.
    fn edges(&self) -> Vec<GraphEdge>;

    /// Remove `(source, target)` edges. Returns the number removed.
    fn delete_edges(&mut self, pairs: &[(String, String)]) -> usize;

    /// Personalized PageRank; one score per vertex in `node_ids()` order.
    fn personalized_pagerank(&self, params: &PprParams) -> Result<Vec<f64>>;

    /// Persist the graph to `path`.
    fn serialize(&self, path: &Path) -> Result<()>;

    fn vcount(&self) -> usize;

    fn ecount(&self) -> usize;

    fn stats(&self) -> GraphStats;
}

/// On-disk form of the graph.
#[derive(Debug, Serialize, Deserialize)]
struct GraphSnapshot {
    directed: bool,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

/// In-memory graph on a `StableDiGraph` so indices survive deletions.
pub struct PetgraphEngine {
    graph: StableDiGraph<GraphNode, f64>,
    node_index: HashMap<String, NodeIndex>,
    directed: bool,
}

impl PetgraphEngine {
    pub fn new(directed: bool) -> Self {
        Self {
            graph: StableDiGraph::default(),
            node_index: HashMap::new(),
            directed,
        }
    }

    /// Load a serialized graph, or start empty if `path` does not exist.
    pub fn load_or_create(path: &Path, directed: bool) -> Result<Self> {
        if !path.exists() {
            info!("No graph at {}, starting empty", path.display());
            return Ok(Self::new(directed));
        }

        let raw = std::fs::read_to_string(path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)
            .map_err(|e| Error::Graph(format!("Corrupt graph file {}: {}", path.display(), e)))?;
        if snapshot.directed != directed {
            warn!(
                "Graph at {} was saved with directed={}, opening with directed={}",
                path.display(),
                snapshot.directed,
                directed
            );
        }

        let mut engine = Self::new(directed);
        engine.add_vertices(snapshot.nodes);
        engine.add_edges(snapshot.edges);
        info!(
            "Loaded graph from {}: {} vertices, {} edges",
            path.display(),
            engine.vcount(),
            engine.ecount()
        );
        Ok(engine)
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    fn positions(&self) -> HashMap<NodeIndex, usize> {
        self.graph
            .node_indices()
            .enumerate()
            .map(|(pos, idx)| (idx, pos))
            .collect()
    }
}

impl Default for PetgraphEngine {
    fn default() -> Self {
        Self::new(false)
    }
}

impl GraphEngine for PetgraphEngine {
    fn add_vertices(&mut self, nodes: Vec<GraphNode>) -> usize {
        let mut added = 0;
        for node in nodes {
            if self.node_index.contains_key(&node.id) {
                continue;
            }
            let id = node.id.clone();
            let idx = self.graph.add_node(node);
            self.node_index.insert(id, idx);
            added += 1;
        }
        added
    }

    fn add_edges(&mut self, edges: Vec<GraphEdge>) -> usize {
        let mut inserted = 0;
        let mut skipped = 0;
        for edge in edges {
            let (Some(&s), Some(&t)) = (
                self.node_index.get(&edge.source),
                self.node_index.get(&edge.target),
            ) else {
                skipped += 1;
                continue;
            };
            match self.graph.find_edge(s, t) {
                Some(e) => self.graph[e] = edge.weight,
                None => {
                    self.graph.add_edge(s, t, edge.weight);
                    inserted += 1;
                }
            }
        }
        if skipped > 0 {
            debug!("Skipped {} edges with missing endpoints", skipped);
        }
        inserted
    }

    fn delete_vertices(&mut self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if let Some(idx) = self.node_index.remove(id) {
                self.graph.remove_node(idx);
                removed += 1;
            }
        }
        removed
    }

    fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    fn node_ids(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    fn node(&self, id: &str) -> Option<GraphNode> {
        self.node_index.get(id).map(|&idx| self.graph[idx].clone())
    }

    fn edge_weight(&self, source: &str, target: &str) -> Option<f64> {
        let s = *self.node_index.get(source)?;
        let t = *self.node_index.get(target)?;
        self.graph.find_edge(s, t).map(|e| self.graph[e])
    }

    fn edges(&self) -> Vec<GraphEdge> {
        self.graph
            .edge_references()
            .map(|e| GraphEdge {
                source: self.graph[e.source()].id.clone(),
                target: self.graph[e.target()].id.clone(),
                weight: *e.weight(),
            })
            .collect()
    }

    fn delete_edges(&mut self, pairs: &[(String, String)]) -> usize {
        let mut removed = 0;
        for (source, target) in pairs {
            let (Some(&s), Some(&t)) = (self.node_index.get(source), self.node_index.get(target))
            else {
                continue;
            };
            if let Some(e) = self.graph.find_edge(s, t) {
                self.graph.remove_edge(e);
                removed += 1;
            }
        }
        removed
    }

    fn personalized_pagerank(&self, params: &PprParams) -> Result<Vec<f64>> {
        let positions = self.positions();
        let edges: Vec<(usize, usize, f64)> = self
            .graph
            .edge_references()
            .map(|e| (positions[&e.source()], positions[&e.target()], *e.weight()))
            .collect();
        let adjacency = build_adjacency(positions.len(), &edges, params.directed);
        personalized_pagerank(
            &adjacency,
            &params.reset,
            params.damping,
            params.max_iterations,
            params.tolerance,
        )
    }

    fn serialize(&self, path: &Path) -> Result<()> {
        let snapshot = GraphSnapshot {
            directed: self.directed,
            nodes: self
                .graph
                .node_indices()
                .map(|idx| self.graph[idx].clone())
                .collect(),
            edges: self.edges(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(&snapshot)?)?;
        std::fs::rename(&tmp, path)?;
        debug!(
            "Saved graph to {} ({} vertices, {} edges)",
            path.display(),
            snapshot.nodes.len(),
            snapshot.edges.len()
        );
        Ok(())
    }

    fn vcount(&self) -> usize {
        self.graph.node_count()
    }

    fn ecount(&self) -> usize {
        self.graph.edge_count()
    }

    fn stats(&self) -> GraphStats {
        let v = self.vcount();
        let e = self.ecount();
        let possible = (v as f64) * (v as f64 - 1.0);
        let density = if v < 2 {
            0.0
        } else if self.directed {
            e as f64 / possible
        } else {
            2.0 * e as f64 / possible
        };

        let mut stats = GraphStats {
            vertices: v,
            edges: e,
            entity_nodes: 0,
            passage_nodes: 0,
            fact_nodes: 0,
            density,
            memory_usage_bytes: e * (std::mem::size_of::<f64>() + 2 * std::mem::size_of::<NodeIndex>()),
        };
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            match node.kind {
                NodeKind::Entity => stats.entity_nodes += 1,
                NodeKind::Passage => stats.passage_nodes += 1,
                NodeKind::Fact => stats.fact_nodes += 1,
            }
            // Node payload plus its id key in the index map.
            stats.memory_usage_bytes += std::mem::size_of::<GraphNode>()
                + 2 * node.id.len()
                + node.content.len()
                + std::mem::size_of::<NodeIndex>();
        }
        stats
    }
}
