//! HippoGraph Engine: incremental knowledge-graph indexing and
//! graph-augmented passage retrieval.
//!
//! `HippoGraph` owns the three embedding stores, the graph, the extraction
//! cache and the edge accumulators. `index` and `delete` mutate it;
//! `retrieve` lazily prepares lookup tables and answers queries.

pub mod builder;
pub mod deadline;
pub mod engine;
pub mod indexer;
pub mod pending;
pub mod rerank;
pub mod retrieval;
pub mod scoring;
pub mod types;

pub use builder::{EdgeKey, IndexBuilder};
pub use deadline::Deadline;
pub use engine::{Collaborators, EngineParts, HippoGraph};
pub use pending::{CommitSummary, PendingChange, PendingSet};
pub use rerank::{PassthroughReranker, RerankLog, RerankOutput, Reranker};
pub use types::*;
