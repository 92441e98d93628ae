//! Extraction data types.

use serde::{Deserialize, Serialize};

use hippograph_core::hashing::chunk_id;
use hippograph_core::types::{normalize_triples, Triple};

/// Named entities found in one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NerOutput {
    pub chunk_id: String,
    pub unique_entities: Vec<String>,
}

/// Raw triples found in one chunk. Elements are unnormalized and may be
/// malformed; consumers normalize with `Triple::from_raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripleOutput {
    pub chunk_id: String,
    pub triples: Vec<Vec<String>>,
}

/// Cached extraction result for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(rename = "idx")]
    pub id: String,
    #[serde(rename = "passage")]
    pub passage_text: String,
    pub extracted_entities: Vec<String>,
    pub extracted_triples: Vec<Vec<String>>,
}

impl ExtractionRecord {
    pub fn new(id: impl Into<String>, passage_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            passage_text: passage_text.into(),
            extracted_entities: Vec::new(),
            extracted_triples: Vec::new(),
        }
    }

    /// Whether `id` is the chunk id derived from the passage text.
    pub fn is_normalized(&self) -> bool {
        self.id == chunk_id(&self.passage_text)
    }

    /// Normalized, deduplicated, well-formed triples.
    pub fn triples(&self) -> Vec<Triple> {
        normalize_triples(&self.extracted_triples)
    }
}
