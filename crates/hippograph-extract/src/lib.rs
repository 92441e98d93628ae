//! HippoGraph Extract: named entities and triples per chunk.
//!
//! `OpenIe` is the extraction-processor boundary. `ExtractionResultCache`
//! persists its output so unchanged chunks are never extracted twice.

pub mod cache;
pub mod heuristic;
pub mod processor;
pub mod types;

pub use cache::{ExtractionPlan, ExtractionResultCache};
pub use heuristic::HeuristicOpenIe;
pub use processor::OpenIe;
pub use types::*;
