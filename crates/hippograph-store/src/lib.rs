//! HippoGraph Store: embedding stores and the graph engine.
//!
//! Three logical `EmbeddingStore`s (chunk, entity, fact) hold node content
//! and vectors; the `GraphEngine` holds the projection of those nodes plus
//! weighted edges and runs personalized PageRank.

pub mod graph;
pub mod pagerank;
pub mod quantize;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use graph::{GraphEngine, PetgraphEngine};
pub use sqlite::SqliteEmbeddingStore;
pub use types::*;
pub use vector::EmbeddingStore;
