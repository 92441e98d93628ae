//! Extraction processor interface.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use hippograph_core::Result;

use crate::types::{NerOutput, TripleOutput};

/// Turns chunk text into named entities and triples.
///
/// Implementations only need `ner` and `triple_extraction`; the batch
/// entry point isolates per-chunk failures.
pub trait OpenIe: Send + Sync {
    /// Name used to namespace the extraction-results file.
    fn model_name(&self) -> &str;

    fn ner(&self, chunk_id: &str, text: &str) -> Result<NerOutput>;

    fn triple_extraction(
        &self,
        chunk_id: &str,
        text: &str,
        entities: &[String],
    ) -> Result<TripleOutput>;

    /// Extract every chunk in `chunks` (`chunk id → text`).
    ///
    /// A chunk whose NER or triple step fails gets empty results; the
    /// batch itself never fails.
    fn batch_open_ie(
        &self,
        chunks: &BTreeMap<String, String>,
    ) -> (HashMap<String, NerOutput>, HashMap<String, TripleOutput>) {
        let mut ner_results = HashMap::with_capacity(chunks.len());
        let mut triple_results = HashMap::with_capacity(chunks.len());
        let mut failures = 0;

        for (chunk_id, text) in chunks {
            let ner = match self.ner(chunk_id, text) {
                Ok(ner) => ner,
                Err(e) => {
                    warn!("NER failed for {}: {}", chunk_id, e);
                    failures += 1;
                    NerOutput {
                        chunk_id: chunk_id.clone(),
                        unique_entities: Vec::new(),
                    }
                }
            };

            let triples = if ner.unique_entities.is_empty() {
                TripleOutput {
                    chunk_id: chunk_id.clone(),
                    triples: Vec::new(),
                }
            } else {
                match self.triple_extraction(chunk_id, text, &ner.unique_entities) {
                    Ok(triples) => triples,
                    Err(e) => {
                        warn!("Triple extraction failed for {}: {}", chunk_id, e);
                        failures += 1;
                        TripleOutput {
                            chunk_id: chunk_id.clone(),
                            triples: Vec::new(),
                        }
                    }
                }
            };

            ner_results.insert(chunk_id.clone(), ner);
            triple_results.insert(chunk_id.clone(), triples);
        }

        debug!(
            "Batch extraction: {} chunks, {} failures",
            chunks.len(),
            failures
        );
        (ner_results, triple_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippograph_core::Error;

    /// Fails on any chunk whose text contains "boom".
    struct Flaky;

    impl OpenIe for Flaky {
        fn model_name(&self) -> &str {
            "flaky"
        }

        fn ner(&self, chunk_id: &str, text: &str) -> Result<NerOutput> {
            if text.contains("boom") {
                return Err(Error::Extraction("model unavailable".into()));
            }
            Ok(NerOutput {
                chunk_id: chunk_id.into(),
                unique_entities: vec!["Acme".into(), "Widgets".into()],
            })
        }

        fn triple_extraction(
            &self,
            chunk_id: &str,
            _text: &str,
            entities: &[String],
        ) -> Result<TripleOutput> {
            Ok(TripleOutput {
                chunk_id: chunk_id.into(),
                triples: vec![vec![entities[0].clone(), "owns".into(), entities[1].clone()]],
            })
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut chunks = BTreeMap::new();
        chunks.insert("chunk-ok".to_string(), "Acme owns Widgets".to_string());
        chunks.insert("chunk-bad".to_string(), "boom".to_string());

        let (ner, triples) = Flaky.batch_open_ie(&chunks);
        assert_eq!(ner.len(), 2);
        assert_eq!(triples.len(), 2);
        assert!(ner["chunk-bad"].unique_entities.is_empty());
        assert!(triples["chunk-bad"].triples.is_empty());
        assert_eq!(triples["chunk-ok"].triples.len(), 1);
    }
}
