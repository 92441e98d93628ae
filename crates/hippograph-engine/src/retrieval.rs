//! Query-time retrieval.
//!
//! Per query: score facts against the query embedding, rerank them, turn
//! surviving facts into entity seed weights, fuse with dense passage
//! scores, then rank passages by personalized PageRank. If reranking keeps
//! no facts the dense ranking is returned as is.

use std::collections::HashMap;

use ndarray::Array1;
use tracing::{debug, info, warn};

use hippograph_core::hashing::entity_id;
use hippograph_core::{Result, Triple};
use hippograph_store::PprParams;

use crate::deadline::Deadline;
use crate::engine::{HippoGraph, RetrievalState};
use crate::scoring::{argsort_desc, min_max_normalize, sanitize_weights};
use crate::types::{QuerySolution, RetrievalMode, RetrievedPassage};

/// Fact similarity for one query.
struct FactScores {
    /// Normalized score per fact-key position; zero outside the candidates.
    normalized: Vec<f64>,
    /// `(fact position, raw score)`, best first.
    candidates: Vec<(usize, f64)>,
}

/// A dense passage hit resolved to its graph position.
#[derive(Debug, Clone)]
struct DenseHit {
    position: usize,
    id: String,
    /// Min–max normalized over the resolved hits.
    score: f64,
}

impl HippoGraph {
    /// Build lookup tables for retrieval, restoring graph nodes and edges
    /// that the stores and accumulators know about but the graph lacks.
    pub fn prepare_retrieval_objects(&mut self) -> Result<()> {
        let passages = self.chunk_store.list()?;
        let entity_count = self.entity_store.stat()?.count;
        let facts = self.fact_store.list()?;
        let expected = passages.len() + entity_count + facts.len();

        if self.graph.vcount() != expected {
            warn!(
                "Graph has {} vertices but stores hold {} rows; restoring missing nodes and edges",
                self.graph.vcount(),
                expected
            );
            let summary = self.materialize()?;
            if !summary.is_empty() {
                self.save_graph()?;
            }
            if self.graph.vcount() != expected {
                warn!(
                    "Graph still has {} vertices for {} store rows",
                    self.graph.vcount(),
                    expected
                );
            }
        }

        if self.builder.entity_index_is_empty() {
            self.builder
                .rebuild_entity_index(&self.extraction_cache.load());
        }

        let node_position: HashMap<String, usize> = self
            .graph
            .node_ids()
            .into_iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();

        let mut state = RetrievalState {
            ready: true,
            vertex_count: node_position.len(),
            node_position,
            ..Default::default()
        };
        for doc in passages {
            state.passage_keys.push(doc.id.clone());
            state.passage_contents.insert(doc.id, doc.content);
        }
        let mut unparsable = 0;
        for doc in facts {
            match Triple::from_json(&doc.content) {
                Some(triple) => {
                    state.fact_position.insert(doc.id.clone(), state.fact_keys.len());
                    state.fact_keys.push(doc.id);
                    state.facts.push(triple);
                }
                None => unparsable += 1,
            }
        }
        if unparsable > 0 {
            warn!("Skipped {} fact rows that are not valid triples", unparsable);
        }

        info!(
            "Retrieval ready: {} passages, {} facts, {} vertices",
            state.passage_keys.len(),
            state.fact_keys.len(),
            state.vertex_count
        );
        self.retrieval = state;
        Ok(())
    }

    /// Rank passages for each query. `top_k` defaults to `retrieval_top_k`.
    pub fn retrieve(
        &mut self,
        queries: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<QuerySolution>> {
        let deadline = Deadline::from_timeout_ms(self.config.operation_timeout_ms);
        if !self.retrieval.ready {
            self.prepare_retrieval_objects()?;
        }
        let top_k = top_k.unwrap_or(self.config.retrieval_top_k);
        queries
            .iter()
            .map(|q| self.retrieve_one(q, top_k, &deadline))
            .collect()
    }

    /// Rank passages by dense similarity alone, skipping the graph.
    pub fn retrieve_dense(
        &mut self,
        queries: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<QuerySolution>> {
        let deadline = Deadline::from_timeout_ms(self.config.operation_timeout_ms);
        if !self.retrieval.ready {
            self.prepare_retrieval_objects()?;
        }
        let top_k = top_k.unwrap_or(self.config.retrieval_top_k);
        queries
            .iter()
            .map(|q| {
                let embedding = self.query_embedding(q, &deadline)?;
                let dense = self.dense_passages(&embedding, &deadline)?;
                Ok(self.dense_solution(q, &dense, Vec::new(), top_k))
            })
            .collect()
    }

    fn retrieve_one(&self, query: &str, top_k: usize, deadline: &Deadline) -> Result<QuerySolution> {
        let embedding = self.query_embedding(query, deadline)?;
        let fact_scores = self.score_facts(&embedding, deadline)?;
        let (fact_indices, top_facts) = self.rerank_facts(query, &fact_scores, deadline)?;
        let dense = self.dense_passages(&embedding, deadline)?;

        if top_facts.is_empty() {
            info!("No facts survived reranking for '{}'; using dense ranking", query);
            return Ok(self.dense_solution(query, &dense, top_facts, top_k));
        }

        let mut weights = self.phrase_weights(&fact_indices, &top_facts, &fact_scores.normalized);
        for hit in &dense {
            weights[hit.position] += hit.score * self.config.passage_node_weight;
        }
        sanitize_weights(&mut weights);
        if weights.iter().sum::<f64>() <= 0.0 {
            warn!("All seed weights are zero for '{}'; returning no passages", query);
            return Ok(QuerySolution {
                question: query.to_string(),
                docs: Vec::new(),
                facts: top_facts,
                mode: RetrievalMode::Empty,
            });
        }

        deadline.check("graph search")?;
        let scores = self.graph.personalized_pagerank(&PprParams {
            reset: weights,
            damping: self.config.damping,
            directed: self.config.is_directed_graph,
            max_iterations: self.config.ppr_max_iterations,
            tolerance: self.config.ppr_tolerance,
        })?;

        let state = &self.retrieval;
        let passage_scores: Vec<f64> = state
            .passage_keys
            .iter()
            .map(|key| {
                state
                    .node_position
                    .get(key)
                    .and_then(|&pos| scores.get(pos))
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect();
        let docs = argsort_desc(&passage_scores)
            .into_iter()
            .take(top_k)
            .map(|i| self.passage(&state.passage_keys[i], passage_scores[i]))
            .collect();

        Ok(QuerySolution {
            question: query.to_string(),
            docs,
            facts: top_facts,
            mode: RetrievalMode::Graph,
        })
    }

    fn query_embedding(&self, query: &str, deadline: &Deadline) -> Result<Array1<f32>> {
        deadline.check("query embedding")?;
        let embedder = &self.embedder;
        self.query_cache
            .get_or_embed(query, |q| embedder.embed_query(q))
    }

    /// Similarity of the query to the best `3 × linking_top_k` facts.
    fn score_facts(&self, embedding: &Array1<f32>, deadline: &Deadline) -> Result<FactScores> {
        let state = &self.retrieval;
        let n = state.fact_keys.len();
        let mut normalized = vec![0.0; n];
        if n == 0 {
            return Ok(FactScores {
                normalized,
                candidates: Vec::new(),
            });
        }

        let linking = self.config.linking_top_k;
        let k = if linking == 0 {
            n
        } else {
            linking.saturating_mul(3).min(n)
        };
        deadline.check("fact search")?;
        let hits = self
            .fact_store
            .similarity_search_vector_with_score(embedding, k)?;

        let mut candidates: Vec<(usize, f64)> = hits
            .iter()
            .filter_map(|h| state.fact_position.get(&h.document.id).map(|&p| (p, h.score)))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let raw: Vec<f64> = candidates.iter().map(|(_, s)| *s).collect();
        for ((pos, _), score) in candidates.iter().zip(min_max_normalize(&raw)) {
            normalized[*pos] = score;
        }
        Ok(FactScores {
            normalized,
            candidates,
        })
    }

    /// Hand the best candidates to the reranker. A reranker error leaves no
    /// facts, which sends the query down the dense path.
    fn rerank_facts(
        &self,
        query: &str,
        scores: &FactScores,
        deadline: &Deadline,
    ) -> Result<(Vec<usize>, Vec<Triple>)> {
        let linking = self.config.linking_top_k;
        let mut candidates = scores.candidates.clone();
        if let Some(min) = self.config.fact_candidate_min_score {
            candidates.retain(|(_, s)| *s >= min);
        }
        if linking > 0 {
            candidates.truncate(linking);
        }
        if candidates.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let indices: Vec<usize> = candidates.iter().map(|(p, _)| *p).collect();
        let facts: Vec<Triple> = indices
            .iter()
            .map(|&p| self.retrieval.facts[p].clone())
            .collect();
        let top_k = if linking == 0 { facts.len() } else { linking };

        deadline.check("rerank")?;
        match self.reranker.rerank(query, &facts, &indices, top_k) {
            Ok(out) => {
                debug!(
                    "Rerank kept {} of {} facts",
                    out.log.facts_after, out.log.facts_before
                );
                let n = self.retrieval.fact_keys.len();
                Ok(out
                    .indices
                    .into_iter()
                    .zip(out.facts)
                    .filter(|(p, _)| *p < n)
                    .unzip())
            }
            Err(e) => {
                warn!("Reranker failed, continuing without facts: {}", e);
                Ok((Vec::new(), Vec::new()))
            }
        }
    }

    /// Seed weights on entity vertices from the reranked facts.
    ///
    /// Each subject and object gets its fact's normalized score divided by
    /// the number of chunks mentioning it, averaged over occurrences. Only
    /// the `linking_top_k` heaviest entities keep their weight.
    fn phrase_weights(&self, indices: &[usize], facts: &[Triple], normalized: &[f64]) -> Vec<f64> {
        let state = &self.retrieval;
        let mut weights = vec![0.0; state.vertex_count];
        let mut occurrences = vec![0usize; state.vertex_count];

        for (&fact_pos, triple) in indices.iter().zip(facts) {
            let score = normalized.get(fact_pos).copied().unwrap_or(0.0);
            for phrase in triple.entities() {
                let key = entity_id(phrase);
                let Some(&pos) = state.node_position.get(&key) else {
                    continue;
                };
                let chunks = self.builder.chunk_count(&key);
                let weight = if chunks > 0 { score / chunks as f64 } else { score };
                weights[pos] += weight;
                occurrences[pos] += 1;
            }
        }
        for (w, &n) in weights.iter_mut().zip(&occurrences) {
            if n > 0 {
                *w /= n as f64;
            }
        }

        let linking = self.config.linking_top_k;
        if linking > 0 {
            let touched: Vec<usize> = (0..weights.len()).filter(|&i| occurrences[i] > 0).collect();
            let touched_weights: Vec<f64> = touched.iter().map(|&i| weights[i]).collect();
            for rank in argsort_desc(&touched_weights).into_iter().skip(linking) {
                weights[touched[rank]] = 0.0;
            }
        }
        weights
    }

    /// Top `dense_top_k` passages by similarity, resolved to graph positions.
    fn dense_passages(&self, embedding: &Array1<f32>, deadline: &Deadline) -> Result<Vec<DenseHit>> {
        let state = &self.retrieval;
        let k = self.config.dense_top_k.min(state.passage_keys.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        deadline.check("dense passage search")?;
        let hits = self
            .chunk_store
            .similarity_search_vector_with_score(embedding, k)?;

        let mut resolved = Vec::with_capacity(hits.len());
        let mut unresolved = 0;
        for hit in hits {
            match state.node_position.get(&hit.document.id) {
                Some(&position) => resolved.push((position, hit.document.id, hit.score)),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            warn!("{} dense hits have no graph vertex and were dropped", unresolved);
        }

        let raw: Vec<f64> = resolved.iter().map(|(_, _, s)| *s).collect();
        Ok(resolved
            .into_iter()
            .zip(min_max_normalize(&raw))
            .map(|((position, id, _), score)| DenseHit {
                position,
                id,
                score,
            })
            .collect())
    }

    fn dense_solution(
        &self,
        query: &str,
        dense: &[DenseHit],
        facts: Vec<Triple>,
        top_k: usize,
    ) -> QuerySolution {
        QuerySolution {
            question: query.to_string(),
            docs: dense
                .iter()
                .take(top_k)
                .map(|hit| self.passage(&hit.id, hit.score))
                .collect(),
            facts,
            mode: RetrievalMode::Dense,
        }
    }

    fn passage(&self, id: &str, score: f64) -> RetrievedPassage {
        RetrievedPassage {
            id: id.to_string(),
            content: self
                .retrieval
                .passage_contents
                .get(id)
                .cloned()
                .unwrap_or_default(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use hippograph_core::hashing::fact_id;
    use hippograph_core::HippoGraphConfig;
    use hippograph_store::StoreDocument;

    use super::*;

    fn engine(dir: &Path, linking_top_k: usize) -> HippoGraph {
        HippoGraph::open(HippoGraphConfig {
            linking_top_k,
            ..HippoGraphConfig::with_save_dir(dir)
        })
        .unwrap()
    }

    #[test]
    fn test_phrase_weights_divide_average_and_keep_top_phrases() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), 3);

        // "a" appears in two chunks, every other entity in one.
        engine.builder.add_fact_edges("chunk-1", &[Triple::new("a", "r", "b")], false);
        engine.builder.add_fact_edges("chunk-2", &[Triple::new("a", "r", "e")], false);
        engine.builder.add_fact_edges("chunk-3", &[Triple::new("d", "r", "c")], false);

        let node_position: HashMap<String, usize> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(pos, name)| (entity_id(name), pos))
            .collect();
        engine.retrieval = RetrievalState {
            ready: true,
            node_position,
            vertex_count: 5,
            ..Default::default()
        };

        let facts = vec![
            Triple::new("a", "r", "b"),
            Triple::new("b", "r", "c"),
            Triple::new("d", "r", "c"),
        ];
        let normalized = [1.0, 0.5, 0.25];

        // a: 1.0 / 2 chunks; b: mean(1.0, 0.5); c: mean(0.5, 0.25);
        // d: 0.25 but fourth heaviest, so zeroed.
        let weights = engine.phrase_weights(&[0, 1, 2], &facts, &normalized);
        assert_eq!(weights, vec![0.5, 0.75, 0.375, 0.0, 0.0]);

        engine.config.linking_top_k = 0;
        let weights = engine.phrase_weights(&[0, 1, 2], &facts, &normalized);
        assert_eq!(weights, vec![0.5, 0.75, 0.375, 0.25, 0.0]);

        engine.config.linking_top_k = 1;
        let weights = engine.phrase_weights(&[0, 1, 2], &facts, &normalized);
        assert_eq!(weights, vec![0.0, 0.75, 0.0, 0.0, 0.0]);
    }

    fn add_facts(engine: &HippoGraph, facts: &[Triple]) {
        let docs: Vec<StoreDocument> = facts
            .iter()
            .map(|t| StoreDocument::new(fact_id(t), t.to_json()))
            .collect();
        engine.fact_store.add_documents(&docs).unwrap();
    }

    #[test]
    fn test_fact_scores_cover_every_fact_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), 1);
        add_facts(
            &engine,
            &[
                Triple::new("acme corp", "makes", "rockets"),
                Triple::new("acme corp", "hired", "bob smith"),
                Triple::new("nile", "flows through", "egypt"),
                Triple::new("rockets", "made in", "ohio"),
                Triple::new("bob smith", "lives in", "ohio"),
            ],
        );
        engine.prepare_retrieval_objects().unwrap();

        let embedding = engine.embedder.embed_query("what does acme corp make").unwrap();
        let scores = engine.score_facts(&embedding, &Deadline::none()).unwrap();

        // linking_top_k = 1 searches 3 of the 5 facts.
        assert_eq!(scores.normalized.len(), engine.retrieval.fact_keys.len());
        assert_eq!(scores.candidates.len(), 3);
        assert!(scores.candidates.windows(2).all(|w| w[0].1 >= w[1].1));

        let best = scores.candidates[0].0;
        assert_eq!(scores.normalized[best], 1.0);
        for pos in 0..scores.normalized.len() {
            if scores.candidates.iter().all(|(p, _)| *p != pos) {
                assert_eq!(scores.normalized[pos], 0.0);
            }
        }
        assert!(scores.normalized.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_single_fact_scores_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), 5);
        add_facts(&engine, &[Triple::new("nile", "flows through", "egypt")]);
        engine.prepare_retrieval_objects().unwrap();

        let embedding = engine.embedder.embed_query("rockets").unwrap();
        let scores = engine.score_facts(&embedding, &Deadline::none()).unwrap();
        assert_eq!(scores.candidates.len(), 1);
        assert_eq!(scores.normalized, vec![1.0]);
    }

    #[test]
    fn test_no_facts_scores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), 5);
        engine.prepare_retrieval_objects().unwrap();

        let embedding = engine.embedder.embed_query("rockets").unwrap();
        let scores = engine.score_facts(&embedding, &Deadline::none()).unwrap();
        assert!(scores.normalized.is_empty());
        assert!(scores.candidates.is_empty());
    }
}
