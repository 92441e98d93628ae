//! Edge accumulators built up across indexing runs.
//!
//! `IndexBuilder` owns the node-to-node edge weights (fact co-occurrence,
//! passage membership and synonymy) and the entity → chunk index used for
//! phrase weighting at query time. Edges accumulate here first and are only
//! materialized into the graph when a commit runs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use hippograph_core::hashing::entity_id;
use hippograph_core::Triple;
use hippograph_extract::ExtractionRecord;
use hippograph_store::GraphEdge;

/// Directed edge key `source → target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
}

impl EdgeKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn touches(&self, ids: &HashSet<String>) -> bool {
        ids.contains(&self.source) || ids.contains(&self.target)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.source, self.target)
    }
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    node_to_node_stats: BTreeMap<EdgeKey, f64>,
    ent_node_to_chunk_ids: HashMap<String, BTreeSet<String>>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record entity co-occurrence for one chunk's triples.
    ///
    /// The entity → chunk index is always updated. Edge weights only grow
    /// for chunks not yet in the graph, so re-indexing never double counts.
    pub fn add_fact_edges(&mut self, chunk_id: &str, triples: &[Triple], is_new: bool) {
        for triple in triples {
            let subject = entity_id(&triple.subject);
            let object = entity_id(&triple.object);

            self.index_entity(&subject, chunk_id);
            self.index_entity(&object, chunk_id);

            if is_new && subject != object {
                *self
                    .node_to_node_stats
                    .entry(EdgeKey::new(subject.clone(), object.clone()))
                    .or_insert(0.0) += 1.0;
                *self
                    .node_to_node_stats
                    .entry(EdgeKey::new(object, subject))
                    .or_insert(0.0) += 1.0;
            }
        }
    }

    /// Connect a new chunk to every entity its triples mention (weight 1.0).
    ///
    /// Returns the number of distinct entities linked.
    pub fn add_passage_edges(&mut self, chunk_id: &str, triples: &[Triple], is_new: bool) -> usize {
        let mut linked = BTreeSet::new();
        for triple in triples {
            for name in triple.entities() {
                let ent = entity_id(name);
                self.index_entity(&ent, chunk_id);
                linked.insert(ent);
            }
        }
        if is_new {
            for ent in &linked {
                self.node_to_node_stats
                    .insert(EdgeKey::new(chunk_id, ent.clone()), 1.0);
            }
        }
        linked.len()
    }

    /// Undo the co-occurrence counts one chunk's triples contributed.
    ///
    /// Returns every touched pair with its new weight, or `None` when the
    /// count reached zero and the pair was dropped.
    pub fn retract_fact_edges(&mut self, triples: &[Triple]) -> BTreeMap<EdgeKey, Option<f64>> {
        let mut touched = BTreeMap::new();
        for triple in triples {
            let subject = entity_id(&triple.subject);
            let object = entity_id(&triple.object);
            if subject == object {
                continue;
            }
            for key in [
                EdgeKey::new(subject.clone(), object.clone()),
                EdgeKey::new(object.clone(), subject.clone()),
            ] {
                let Some(weight) = self.node_to_node_stats.get_mut(&key) else {
                    continue;
                };
                *weight -= 1.0;
                let remaining = if *weight > 0.0 { Some(*weight) } else { None };
                if remaining.is_none() {
                    self.node_to_node_stats.remove(&key);
                }
                touched.insert(key, remaining);
            }
        }
        touched
    }

    /// Seed edge weights from a persisted graph. Returns the number loaded.
    pub fn load_edges(&mut self, edges: Vec<GraphEdge>) -> usize {
        let loaded = edges.len();
        for edge in edges {
            self.node_to_node_stats
                .insert(EdgeKey::new(edge.source, edge.target), edge.weight);
        }
        loaded
    }

    /// Set the synonymy weight `source → target`, overwriting any prior value.
    pub fn record_synonym(&mut self, source: &str, target: &str, score: f64) {
        self.node_to_node_stats
            .insert(EdgeKey::new(source, target), score);
    }

    fn index_entity(&mut self, entity: &str, chunk_id: &str) {
        self.ent_node_to_chunk_ids
            .entry(entity.to_string())
            .or_default()
            .insert(chunk_id.to_string());
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<f64> {
        self.node_to_node_stats
            .get(&EdgeKey::new(source, target))
            .copied()
    }

    /// All accumulated edges in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeKey, f64)> {
        self.node_to_node_stats.iter().map(|(k, w)| (k, *w))
    }

    pub fn edge_count(&self) -> usize {
        self.node_to_node_stats.len()
    }

    /// Number of chunks mentioning `entity`.
    pub fn chunk_count(&self, entity: &str) -> usize {
        self.ent_node_to_chunk_ids
            .get(entity)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn chunks_for(&self, entity: &str) -> Option<&BTreeSet<String>> {
        self.ent_node_to_chunk_ids.get(entity)
    }

    pub fn entity_index_is_empty(&self) -> bool {
        self.ent_node_to_chunk_ids.is_empty()
    }

    /// Drop every edge touching a removed node. Returns entries dropped.
    pub fn forget_nodes(&mut self, removed: &HashSet<String>) -> usize {
        let before = self.node_to_node_stats.len();
        self.node_to_node_stats.retain(|k, _| !k.touches(removed));
        for id in removed {
            self.ent_node_to_chunk_ids.remove(id);
        }
        before - self.node_to_node_stats.len()
    }

    /// Remove deleted chunks from the entity → chunk index.
    pub fn forget_chunks(&mut self, chunk_ids: &HashSet<String>) {
        self.ent_node_to_chunk_ids.retain(|_, chunks| {
            chunks.retain(|c| !chunk_ids.contains(c));
            !chunks.is_empty()
        });
    }

    /// Rebuild the entity → chunk index from cached extraction records.
    pub fn rebuild_entity_index(&mut self, records: &[ExtractionRecord]) {
        self.ent_node_to_chunk_ids.clear();
        for record in records.iter().filter(|r| r.is_normalized()) {
            for triple in record.triples() {
                for name in triple.entities() {
                    self.index_entity(&entity_id(name), &record.id);
                }
            }
        }
        debug!(
            "Rebuilt entity index: {} entities",
            self.ent_node_to_chunk_ids.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(s, p, o)
    }

    #[test]
    fn test_fact_edges_are_symmetric_and_accumulate() {
        let mut b = IndexBuilder::new();
        let t = vec![triple("acme", "owns", "widgets")];
        b.add_fact_edges("chunk-1", &t, true);
        b.add_fact_edges("chunk-2", &t, true);

        let (a, w) = (entity_id("acme"), entity_id("widgets"));
        assert_eq!(b.edge_weight(&a, &w), Some(2.0));
        assert_eq!(b.edge_weight(&w, &a), Some(2.0));
        assert_eq!(b.chunk_count(&a), 2);
    }

    #[test]
    fn test_known_chunk_updates_index_only() {
        let mut b = IndexBuilder::new();
        let t = vec![triple("acme", "owns", "widgets")];
        b.add_fact_edges("chunk-1", &t, false);
        b.add_passage_edges("chunk-1", &t, false);
        assert_eq!(b.edge_count(), 0);
        assert_eq!(b.chunk_count(&entity_id("widgets")), 1);
    }

    #[test]
    fn test_self_loop_triples_add_no_edge() {
        let mut b = IndexBuilder::new();
        b.add_fact_edges("chunk-1", &[triple("acme", "is", "acme")], true);
        assert_eq!(b.edge_count(), 0);
    }

    #[test]
    fn test_passage_edges() {
        let mut b = IndexBuilder::new();
        let t = vec![
            triple("acme", "owns", "widgets"),
            triple("widgets", "in", "ohio"),
        ];
        assert_eq!(b.add_passage_edges("chunk-1", &t, true), 3);
        assert_eq!(b.edge_weight("chunk-1", &entity_id("ohio")), Some(1.0));
        assert_eq!(b.edge_weight(&entity_id("ohio"), "chunk-1"), None);
    }

    #[test]
    fn test_forget_nodes_and_chunks() {
        let mut b = IndexBuilder::new();
        let t = vec![triple("acme", "owns", "widgets")];
        b.add_fact_edges("chunk-1", &t, true);
        b.add_passage_edges("chunk-1", &t, true);
        b.add_passage_edges("chunk-2", &t, true);
        b.record_synonym(&entity_id("acme"), &entity_id("acme corp"), 0.9);

        let removed: HashSet<String> = ["chunk-1".to_string()].into_iter().collect();
        assert_eq!(b.forget_nodes(&removed), 2);
        b.forget_chunks(&removed);
        assert_eq!(b.chunk_count(&entity_id("acme")), 1);
        assert!(b.edges().all(|(k, _)| !k.touches(&removed)));
        assert_eq!(b.edge_weight(&entity_id("acme"), &entity_id("acme corp")), Some(0.9));
    }

    #[test]
    fn test_retract_reverses_one_chunk() {
        let mut b = IndexBuilder::new();
        let t = vec![triple("acme", "owns", "widgets")];
        b.add_fact_edges("chunk-1", &t, true);
        b.add_fact_edges("chunk-2", &t, true);

        let (a, w) = (entity_id("acme"), entity_id("widgets"));
        let touched = b.retract_fact_edges(&t);
        assert_eq!(touched.get(&EdgeKey::new(a.clone(), w.clone())), Some(&Some(1.0)));
        assert_eq!(b.edge_weight(&w, &a), Some(1.0));

        let touched = b.retract_fact_edges(&t);
        assert_eq!(touched.get(&EdgeKey::new(w.clone(), a.clone())), Some(&None));
        assert_eq!(b.edge_weight(&a, &w), None);
        assert_eq!(b.edge_count(), 0);

        assert!(b.retract_fact_edges(&t).is_empty());
    }

    #[test]
    fn test_load_edges_seeds_weights() {
        let mut b = IndexBuilder::new();
        let (a, w) = (entity_id("acme"), entity_id("widgets"));
        let loaded = b.load_edges(vec![
            GraphEdge::new(a.clone(), w.clone(), 2.0),
            GraphEdge::new(w.clone(), a.clone(), 2.0),
        ]);
        assert_eq!(loaded, 2);

        b.add_fact_edges("chunk-3", &[triple("acme", "owns", "widgets")], true);
        assert_eq!(b.edge_weight(&a, &w), Some(3.0));
        assert_eq!(b.edge_weight(&w, &a), Some(3.0));
    }

    #[test]
    fn test_edge_key_display() {
        assert_eq!(EdgeKey::new("a", "b").to_string(), "a|b");
    }
}
