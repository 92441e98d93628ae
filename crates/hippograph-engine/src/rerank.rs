//! Fact reranking seam.

use serde::Serialize;

use hippograph_core::{Result, Triple};

/// What a reranker kept, aligned by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerankOutput {
    /// Positions into the full fact-key list.
    pub indices: Vec<usize>,
    pub facts: Vec<Triple>,
    pub log: RerankLog,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RerankLog {
    pub facts_before: usize,
    pub facts_after: usize,
}

/// Filters candidate facts down to the ones relevant to a query.
pub trait Reranker: Send + Sync {
    /// `candidates[i]` is the fact at fact-key position `indices[i]`.
    fn rerank(
        &self,
        query: &str,
        candidates: &[Triple],
        indices: &[usize],
        top_k: usize,
    ) -> Result<RerankOutput>;
}

/// Keeps the first `top_k` candidates in score order.
#[derive(Debug, Clone, Default)]
pub struct PassthroughReranker;

impl Reranker for PassthroughReranker {
    fn rerank(
        &self,
        _query: &str,
        candidates: &[Triple],
        indices: &[usize],
        top_k: usize,
    ) -> Result<RerankOutput> {
        let keep = candidates.len().min(indices.len()).min(top_k);
        Ok(RerankOutput {
            indices: indices[..keep].to_vec(),
            facts: candidates[..keep].to_vec(),
            log: RerankLog {
                facts_before: candidates.len(),
                facts_after: keep,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_truncates() {
        let facts = vec![
            Triple::new("a", "r", "b"),
            Triple::new("b", "r", "c"),
            Triple::new("c", "r", "d"),
        ];
        let out = PassthroughReranker
            .rerank("q", &facts, &[7, 2, 5], 2)
            .unwrap();
        assert_eq!(out.indices, vec![7, 2]);
        assert_eq!(out.facts, facts[..2].to_vec());
        assert_eq!(out.log.facts_before, 3);
        assert_eq!(out.log.facts_after, 2);
    }
}
