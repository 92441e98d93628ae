//! Two-phase graph mutation: stage nodes and edges, then commit at once.

use std::collections::HashSet;

use tracing::debug;

use hippograph_store::{GraphEdge, GraphEngine, GraphNode};

/// A staged graph change.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Node(GraphNode),
    Edge(GraphEdge),
}

/// Counts from one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub nodes_added: usize,
    pub edges_added: usize,
    pub edges_updated: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.nodes_added == 0 && self.edges_added == 0 && self.edges_updated == 0
    }
}

#[derive(Debug, Default)]
pub struct PendingSet {
    changes: Vec<PendingChange>,
    staged_nodes: HashSet<String>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a node. Returns false if the id was already staged.
    pub fn stage_node(&mut self, node: GraphNode) -> bool {
        if !self.staged_nodes.insert(node.id.clone()) {
            return false;
        }
        self.changes.push(PendingChange::Node(node));
        true
    }

    pub fn stage_edge(&mut self, edge: GraphEdge) {
        self.changes.push(PendingChange::Edge(edge));
    }

    pub fn is_staged_node(&self, id: &str) -> bool {
        self.staged_nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply every staged change: all nodes first, then all edges.
    pub fn commit(self, graph: &mut dyn GraphEngine) -> CommitSummary {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for change in self.changes {
            match change {
                PendingChange::Node(n) => nodes.push(n),
                PendingChange::Edge(e) => edges.push(e),
            }
        }

        let staged_edges = edges.len();
        let nodes_added = if nodes.is_empty() {
            0
        } else {
            graph.add_vertices(nodes)
        };
        let edges_added = if edges.is_empty() {
            0
        } else {
            graph.add_edges(edges)
        };

        let summary = CommitSummary {
            nodes_added,
            edges_added,
            edges_updated: staged_edges.saturating_sub(edges_added),
        };
        debug!("Committed pending graph changes: {:?}", summary);
        summary
    }
}
