//! Persistent extraction results, one JSON file per extraction model.
//!
//! The cache decides which chunks still need extraction: a chunk is
//! covered only by a record stored under its normalized chunk id.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hippograph_core::Result;

use crate::types::{ExtractionRecord, NerOutput, TripleOutput};

/// On-disk layout of the extraction-results file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    docs: Vec<ExtractionRecord>,
    #[serde(default)]
    avg_ent_chars: f64,
    #[serde(default)]
    avg_ent_words: f64,
}

/// Which of the requested chunks are already extracted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionPlan {
    pub cached: Vec<String>,
    pub pending: Vec<String>,
}

/// File-backed cache of per-chunk extraction records.
pub struct ExtractionResultCache {
    path: PathBuf,
}

impl ExtractionResultCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load all records. A missing or unreadable file is an empty cache.
    pub fn load(&self) -> Vec<ExtractionRecord> {
        if !self.exists() {
            return Vec::new();
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot read extraction cache {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<CacheFile>(&raw) {
            Ok(file) => {
                debug!("Loaded {} extraction records", file.docs.len());
                file.docs
            }
            Err(e) => {
                warn!(
                    "Extraction cache {} is corrupt, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Replace the cache contents with `records`.
    pub fn save(&self, records: &[ExtractionRecord]) -> Result<()> {
        let (avg_ent_chars, avg_ent_words) = entity_averages(records);
        let file = CacheFile {
            docs: records.to_vec(),
            avg_ent_chars,
            avg_ent_words,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        info!(
            "Saved {} extraction records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Insert or replace the record for `record.id`.
    pub fn add(&self, record: ExtractionRecord) -> Result<()> {
        let mut records = self.load();
        upsert(&mut records, record);
        self.save(&records)
    }

    /// Split `chunk_ids` into already-extracted and needs-extraction.
    pub fn plan(records: &[ExtractionRecord], chunk_ids: &[String]) -> ExtractionPlan {
        let covered: HashSet<&str> = records
            .iter()
            .filter(|r| r.is_normalized())
            .map(|r| r.id.as_str())
            .collect();

        let mut plan = ExtractionPlan::default();
        for id in chunk_ids {
            if covered.contains(id.as_str()) {
                plan.cached.push(id.clone());
            } else {
                plan.pending.push(id.clone());
            }
        }
        plan
    }

    /// Fold fresh extraction output into `records`.
    ///
    /// `rows` maps chunk id to passage text for every extracted chunk.
    /// Stale records for the same passage are replaced.
    pub fn merge(
        records: &mut Vec<ExtractionRecord>,
        rows: &BTreeMap<String, String>,
        ner: &HashMap<String, NerOutput>,
        triples: &HashMap<String, TripleOutput>,
    ) {
        for (chunk_id, text) in rows {
            let mut record = ExtractionRecord::new(chunk_id.clone(), text.clone());
            if let Some(n) = ner.get(chunk_id) {
                record.extracted_entities = n.unique_entities.clone();
            }
            if let Some(t) = triples.get(chunk_id) {
                record.extracted_triples = t.triples.clone();
            }
            upsert(records, record);
        }
    }
}

/// Replace any record with the same id or the same passage.
fn upsert(records: &mut Vec<ExtractionRecord>, record: ExtractionRecord) {
    records.retain(|r| r.id != record.id && r.passage_text != record.passage_text);
    records.push(record);
}

fn entity_averages(records: &[ExtractionRecord]) -> (f64, f64) {
    let entities: Vec<&String> = records.iter().flat_map(|r| &r.extracted_entities).collect();
    if entities.is_empty() {
        return (0.0, 0.0);
    }
    let n = entities.len() as f64;
    let chars: usize = entities.iter().map(|e| e.chars().count()).sum();
    let words: usize = entities.iter().map(|e| e.split_whitespace().count()).sum();
    (chars as f64 / n, words as f64 / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippograph_core::hashing::chunk_id;
    use tempfile::TempDir;

    fn record(text: &str) -> ExtractionRecord {
        let mut r = ExtractionRecord::new(chunk_id(text), text);
        r.extracted_entities = vec!["Acme Corp".into()];
        r.extracted_triples = vec![vec!["Acme Corp".into(), "makes".into(), "rockets".into()]];
        r
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractionResultCache::new(dir.path().join("openie.json"));
        assert!(!cache.exists());
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openie.json");
        std::fs::write(&path, "{\"docs\": [").unwrap();
        let cache = ExtractionResultCache::new(&path);
        assert!(cache.exists());
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_save_load_and_upsert() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractionResultCache::new(dir.path().join("openie.json"));
        cache.save(&[record("one"), record("two")]).unwrap();

        let mut updated = record("one");
        updated.extracted_entities.clear();
        cache.add(updated.clone()).unwrap();

        let loaded = cache.load();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&updated));
    }

    #[test]
    fn test_file_uses_passage_and_idx_keys() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractionResultCache::new(dir.path().join("openie.json"));
        cache.save(&[record("one")]).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(cache.path()).unwrap()).unwrap();
        assert_eq!(raw["docs"][0]["passage"], "one");
        assert_eq!(raw["docs"][0]["idx"], chunk_id("one"));
        assert_eq!(raw["avg_ent_words"], 2.0);
    }

    #[test]
    fn test_plan_requires_normalized_ids() {
        let good = record("kept");
        let mut stale = record("stale");
        stale.id = "legacy-1".into();

        let ids = vec![chunk_id("kept"), chunk_id("stale"), chunk_id("new")];
        let plan = ExtractionResultCache::plan(&[good, stale], &ids);
        assert_eq!(plan.cached, vec![chunk_id("kept")]);
        assert_eq!(plan.pending, vec![chunk_id("stale"), chunk_id("new")]);
    }

    #[test]
    fn test_merge_replaces_stale_record() {
        let mut stale = record("stale");
        stale.id = "legacy-1".into();
        let mut records = vec![stale];

        let mut rows = BTreeMap::new();
        rows.insert(chunk_id("stale"), "stale".to_string());
        let mut ner = HashMap::new();
        ner.insert(
            chunk_id("stale"),
            NerOutput {
                chunk_id: chunk_id("stale"),
                unique_entities: vec!["X".into()],
            },
        );

        ExtractionResultCache::merge(&mut records, &rows, &ner, &HashMap::new());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_normalized());
        assert_eq!(records[0].extracted_entities, vec!["X"]);
        assert!(records[0].extracted_triples.is_empty());
    }
}
