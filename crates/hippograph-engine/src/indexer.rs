//! Indexing and deletion.
//!
//! `index` runs: chunk insert → extraction (cache-aware) → entity and fact
//! insert → edge accumulation for chunks new to the graph → synonymy edges
//! → one commit of staged nodes and edges → graph save.
//!
//! `delete` removes chunks, reclaims entities and facts that no retained
//! chunk still mentions, and takes the removed chunks' co-occurrence counts
//! back out of the edges between surviving entities.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use hippograph_core::hashing::{canonical_chunk_id, chunk_id, entity_id, fact_id};
use hippograph_core::text::alnum_len;
use hippograph_core::{Result, Triple};
use hippograph_extract::{ExtractionRecord, ExtractionResultCache};
use hippograph_store::{EmbeddingStore, GraphEdge, StoreDocument};

use crate::deadline::Deadline;
use crate::engine::HippoGraph;
use crate::types::{DeleteReport, IndexReport};

/// Entities and facts referenced by a set of extraction records.
#[derive(Debug, Default)]
struct References {
    entities: HashSet<String>,
    facts: HashSet<String>,
}

impl References {
    fn collect<'a>(records: impl IntoIterator<Item = &'a ExtractionRecord>) -> Self {
        let mut refs = Self::default();
        for record in records {
            for triple in record.triples() {
                for name in triple.entities() {
                    refs.entities.insert(entity_id(name));
                }
                refs.facts.insert(fact_id(&triple));
            }
        }
        refs
    }
}

impl HippoGraph {
    /// Index passages. Re-indexing known passages is a no-op for the graph.
    pub fn index(&mut self, chunks: &[String]) -> Result<IndexReport> {
        let deadline = Deadline::from_timeout_ms(self.config.operation_timeout_ms);
        let mut report = IndexReport {
            chunks_submitted: chunks.len(),
            ..Default::default()
        };

        let docs: Vec<StoreDocument> = chunks
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| StoreDocument::new(chunk_id(c), c.clone()))
            .collect();
        if docs.len() < chunks.len() {
            warn!("Skipping {} empty chunks", chunks.len() - docs.len());
        }
        deadline.check("chunk embedding")?;
        report.chunks_inserted = self.chunk_store.add_documents(&docs)?;

        let chunk_rows: BTreeMap<String, String> = self
            .chunk_store
            .list()?
            .into_iter()
            .map(|d| (d.id, d.content))
            .collect();

        let mut records = self.extraction_cache.load();
        let chunk_ids: Vec<String> = chunk_rows.keys().cloned().collect();
        let plan = ExtractionResultCache::plan(&records, &chunk_ids);
        report.chunks_extracted = plan.pending.len();

        if !plan.pending.is_empty() {
            deadline.check("extraction")?;
            let rows: BTreeMap<String, String> = plan
                .pending
                .iter()
                .filter_map(|id| chunk_rows.get(id).map(|t| (id.clone(), t.clone())))
                .collect();
            info!(
                "Extracting {} chunks with {} ({} cached)",
                rows.len(),
                self.openie.model_name(),
                plan.cached.len()
            );
            let (ner, triples) = self.openie.batch_open_ie(&rows);
            ExtractionResultCache::merge(&mut records, &rows, &ner, &triples);
        }
        if !plan.pending.is_empty() || !self.extraction_cache.exists() {
            self.extraction_cache.save(&records)?;
        }

        let by_id: HashMap<&str, &ExtractionRecord> = records
            .iter()
            .filter(|r| r.is_normalized())
            .map(|r| (r.id.as_str(), r))
            .collect();
        let chunk_triples: Vec<(&String, Vec<Triple>)> = chunk_ids
            .iter()
            .map(|id| {
                let triples = by_id.get(id.as_str()).map(|r| r.triples()).unwrap_or_default();
                (id, triples)
            })
            .collect();

        let mut entity_docs = Vec::new();
        let mut fact_docs = Vec::new();
        let mut seen_entities = HashSet::new();
        let mut seen_facts = HashSet::new();
        for (_, triples) in &chunk_triples {
            for triple in triples {
                for name in triple.entities() {
                    let id = entity_id(name);
                    if seen_entities.insert(id.clone()) {
                        entity_docs.push(StoreDocument::new(id, name));
                    }
                }
                let id = fact_id(triple);
                if seen_facts.insert(id.clone()) {
                    fact_docs.push(StoreDocument::new(id, triple.to_json()));
                }
            }
        }

        deadline.check("entity embedding")?;
        report.entities_inserted = self.entity_store.add_documents(&entity_docs)?;
        deadline.check("fact embedding")?;
        report.facts_inserted = self.fact_store.add_documents(&fact_docs)?;

        for (id, triples) in &chunk_triples {
            let is_new = !self.graph.has_node(id.as_str());
            if is_new {
                report.new_graph_chunks += 1;
            }
            self.builder.add_fact_edges(id, triples, is_new);
            self.builder.add_passage_edges(id, triples, is_new);
        }

        if report.new_graph_chunks == 0 {
            info!("No new chunks to add to the graph");
            return Ok(report);
        }

        report.synonymy_edges = self.add_synonymy_edges(&deadline)?;
        let summary = self.materialize()?;
        report.nodes_added = summary.nodes_added;
        report.edges_added = summary.edges_added;
        report.edges_updated = summary.edges_updated;
        self.save_graph()?;
        self.invalidate_retrieval();

        info!(
            "Indexed {} new chunks: +{} nodes, +{} edges, {} synonymy pairs",
            report.new_graph_chunks, report.nodes_added, report.edges_added, report.synonymy_edges
        );
        Ok(report)
    }

    /// Link each entity to its near-duplicates in the entity store.
    ///
    /// Entities with two or fewer alphanumeric characters are skipped.
    /// Scanning a neighbor list stops at the first score below the
    /// threshold or after the neighbor cap.
    fn add_synonymy_edges(&mut self, deadline: &Deadline) -> Result<usize> {
        let entities = self.entity_store.list()?;
        let k = self.config.synonymy_edge_topk.saturating_add(1);
        let threshold = self.config.synonymy_edge_sim_threshold;
        let max_neighbors = self.config.synonymy_max_neighbors;
        let mut recorded = 0;

        for entity in &entities {
            if alnum_len(&entity.content) <= 2 {
                continue;
            }
            deadline.check("synonymy search")?;
            let hits = self
                .entity_store
                .similarity_search_with_score(&entity.content, k)?;

            let mut examined = 0;
            for hit in hits {
                if hit.score < threshold || examined >= max_neighbors {
                    break;
                }
                examined += 1;
                if hit.document.id == entity.id || hit.document.content.trim().is_empty() {
                    continue;
                }
                self.builder
                    .record_synonym(&entity.id, &hit.document.id, hit.score);
                recorded += 1;
            }
        }

        debug!(
            "Synonymy: {} entities scanned, {} pairs recorded",
            entities.len(),
            recorded
        );
        Ok(recorded)
    }

    /// Delete chunks by id and reclaim orphaned entities and facts.
    ///
    /// Store-level failures are logged and skipped so one bad store never
    /// blocks the rest of the cleanup.
    pub fn delete(&mut self, doc_ids: &[String]) -> Result<DeleteReport> {
        let deadline = Deadline::from_timeout_ms(self.config.operation_timeout_ms);
        let targets: HashSet<String> = doc_ids.iter().map(|id| canonical_chunk_id(id)).collect();
        let mut report = DeleteReport {
            chunks_requested: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            return Ok(report);
        }

        let (removed, retained): (Vec<ExtractionRecord>, Vec<ExtractionRecord>) = self
            .extraction_cache
            .load()
            .into_iter()
            .partition(|r| targets.contains(&r.id) || targets.contains(&chunk_id(&r.passage_text)));
        report.records_removed = removed.len();

        let candidates = References::collect(&removed);
        let still_used = References::collect(&retained);
        if !removed.is_empty() {
            self.extraction_cache.save(&retained)?;
        }

        let chunk_ids: Vec<String> = targets.iter().cloned().collect();
        let orphan_entities: Vec<String> = candidates
            .entities
            .difference(&still_used.entities)
            .cloned()
            .collect();
        let orphan_facts: Vec<String> = candidates
            .facts
            .difference(&still_used.facts)
            .cloned()
            .collect();

        deadline.check("store deletion")?;

        // Only chunks already in the graph contributed co-occurrence counts.
        let mut retracted = BTreeMap::new();
        for record in removed.iter().filter(|r| r.is_normalized()) {
            if self.graph.has_node(&record.id) {
                retracted.extend(self.builder.retract_fact_edges(&record.triples()));
            }
        }

        report.chunks_removed = delete_logged(self.chunk_store.as_ref(), &chunk_ids);
        report.entities_removed = delete_logged(self.entity_store.as_ref(), &orphan_entities);
        report.facts_removed = delete_logged(self.fact_store.as_ref(), &orphan_facts);

        let mut vertex_ids = chunk_ids;
        vertex_ids.extend(orphan_entities);
        vertex_ids.extend(orphan_facts);
        report.vertices_removed = self.graph.delete_vertices(&vertex_ids);

        let removed_nodes: HashSet<String> = vertex_ids.into_iter().collect();
        report.edges_forgotten = self.builder.forget_nodes(&removed_nodes);
        self.builder.forget_chunks(&targets);

        let mut reweighted = Vec::new();
        let mut dropped = Vec::new();
        for (key, weight) in retracted {
            if removed_nodes.contains(&key.source) || removed_nodes.contains(&key.target) {
                continue;
            }
            match weight {
                Some(w) => reweighted.push(GraphEdge::new(key.source, key.target, w)),
                None => dropped.push((key.source, key.target)),
            }
        }
        report.edges_reweighted = reweighted.len() + dropped.len();
        self.graph.add_edges(reweighted);
        let edges_removed = self.graph.delete_edges(&dropped);
        self.invalidate_retrieval();

        if report.vertices_removed > 0 || report.edges_reweighted > 0 {
            self.save_graph()?;
        }

        info!(
            "Deleted {} chunks: {} entities and {} facts reclaimed, {} vertices removed, {} edges reweighted ({} dropped)",
            report.chunks_removed,
            report.entities_removed,
            report.facts_removed,
            report.vertices_removed,
            report.edges_reweighted,
            edges_removed
        );
        Ok(report)
    }
}

fn delete_logged(store: &dyn EmbeddingStore, ids: &[String]) -> usize {
    if ids.is_empty() {
        return 0;
    }
    match store.delete(ids) {
        Ok(n) => n,
        Err(e) => {
            warn!("Failed to delete {} rows from {} store: {}", ids.len(), store.namespace(), e);
            0
        }
    }
}
