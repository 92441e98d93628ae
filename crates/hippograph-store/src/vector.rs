//! Embedding store interface.

use ndarray::Array1;

use hippograph_core::Result;

use crate::types::{ScoredDocument, StoreDocument, StoreStat};

/// A namespaced collection of embedded documents with nearest-neighbor search.
///
/// Ids are content hashes, so `add_documents` is idempotent: documents
/// whose id already exists are skipped without re-embedding.
pub trait EmbeddingStore: Send + Sync {
    /// Logical name of the store (`chunk`, `entity`, `fact`).
    fn namespace(&self) -> &str;

    /// Insert documents not yet present. Returns the number inserted.
    fn add_documents(&self, docs: &[StoreDocument]) -> Result<usize>;

    /// Delete documents by id. Returns the number removed.
    fn delete(&self, ids: &[String]) -> Result<usize>;

    /// All documents in insertion order.
    fn list(&self) -> Result<Vec<StoreDocument>>;

    /// Embed `text` and return the `k` most similar documents.
    fn similarity_search_with_score(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>>;

    /// Return the `k` documents most similar to `vector`, best first.
    fn similarity_search_vector_with_score(
        &self,
        vector: &Array1<f32>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>>;

    fn stat(&self) -> Result<StoreStat>;
}
