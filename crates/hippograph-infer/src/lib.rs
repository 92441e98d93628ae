//! HippoGraph Infer: embedding model interface and query cache.
//!
//! The engine only talks to `Embedder`. `HashingEmbedder` is a
//! deterministic, model-free implementation used by the CLI and tests;
//! real models plug in behind the same trait.

pub mod cache;
pub mod embedder;

pub use cache::QueryEmbeddingCache;
pub use embedder::{Embedder, HashingEmbedder};

use std::sync::Arc;

/// Create the embedder registered under `model_name`.
///
/// `hashing-<dim>` names select a `HashingEmbedder`; anything else falls
/// back to a hashing embedder of `dim` dimensions.
pub fn create_embedder(model_name: &str, dim: usize) -> Arc<dyn Embedder> {
    let dim = model_name
        .strip_prefix("hashing-")
        .and_then(|d| d.parse().ok())
        .unwrap_or(dim);
    if !model_name.starts_with("hashing") {
        tracing::warn!(
            "Embedding model '{}' is not built in. Using hashing embedder (dim={}).",
            model_name,
            dim
        );
    }
    Arc::new(HashingEmbedder::new(dim))
}
