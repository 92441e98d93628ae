//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Paths to every artifact one index persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Per-model working directory (`data/<extraction>_<embedding>/`).
    pub working_dir: PathBuf,
    /// Chunk (passage) embedding store (`<working>/chunk_embeddings/`).
    pub chunk_store: PathBuf,
    /// Entity embedding store (`<working>/entity_embeddings/`).
    pub entity_store: PathBuf,
    /// Fact embedding store (`<working>/fact_embeddings/`).
    pub fact_store: PathBuf,
    /// Serialized graph (`<working>/graph.json`).
    pub graph_file: PathBuf,
    /// Extraction results (`data/openie_results_<extraction>.json`).
    pub extraction_file: PathBuf,
}

impl IndexPaths {
    /// Derive paths from the configuration. Creates directories if needed.
    pub fn new(config: &HippoGraphConfig) -> std::io::Result<Self> {
        let root = config.save_dir.clone();
        let extraction = sanitize_model_name(&config.extraction_model_name);
        let embedding = sanitize_model_name(&config.embedding_model_name);
        let working_dir = root.join(format!("{}_{}", extraction, embedding));

        let paths = Self {
            chunk_store: working_dir.join("chunk_embeddings"),
            entity_store: working_dir.join("entity_embeddings"),
            fact_store: working_dir.join("fact_embeddings"),
            graph_file: working_dir.join("graph.json"),
            extraction_file: root.join(format!("openie_results_{}.json", extraction)),
            working_dir,
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    /// Create all required directories.
    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.working_dir)?;
        std::fs::create_dir_all(&self.chunk_store)?;
        std::fs::create_dir_all(&self.entity_store)?;
        std::fs::create_dir_all(&self.fact_store)?;
        Ok(())
    }
}

fn sanitize_model_name(name: &str) -> String {
    name.replace('/', "_")
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HippoGraphConfig {
    /// Root directory for every persisted artifact.
    pub save_dir: PathBuf,
    /// Name of the extraction model; namespaces the extraction-results file.
    pub extraction_model_name: String,
    /// Name of the embedding model; namespaces the working directory.
    pub embedding_model_name: String,
    /// Embedding dimension (384 for the hashing embedder).
    pub embedding_dim: usize,
    /// Neighbors examined per entity when building synonymy edges (`K`; `K+1` are requested).
    pub synonymy_edge_topk: usize,
    /// Minimum similarity for a synonymy edge.
    pub synonymy_edge_sim_threshold: f64,
    /// Hard cap on neighbors scanned per entity.
    pub synonymy_max_neighbors: usize,
    /// Facts and phrases that participate in graph search.
    pub linking_top_k: usize,
    /// Default number of passages returned per query.
    pub retrieval_top_k: usize,
    /// Cap on dense passage hits per query.
    pub dense_top_k: usize,
    /// Scaling applied to dense passage scores before fusion.
    pub passage_node_weight: f64,
    /// Personalized PageRank damping factor.
    pub damping: f64,
    pub is_directed_graph: bool,
    pub ppr_max_iterations: usize,
    pub ppr_tolerance: f64,
    /// Facts scoring below this raw similarity never reach the reranker.
    pub fact_candidate_min_score: Option<f64>,
    /// Deadline for a whole index/delete/retrieve call.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for HippoGraphConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("data"),
            extraction_model_name: "heuristic".to_string(),
            embedding_model_name: "hashing-384".to_string(),
            embedding_dim: 384,
            synonymy_edge_topk: 2047,
            synonymy_edge_sim_threshold: 0.8,
            synonymy_max_neighbors: 100,
            linking_top_k: 5,
            retrieval_top_k: 200,
            dense_top_k: 200,
            passage_node_weight: 0.05,
            damping: 0.5,
            is_directed_graph: false,
            ppr_max_iterations: 100,
            ppr_tolerance: 1e-8,
            fact_candidate_min_score: None,
            operation_timeout_ms: None,
        }
    }
}

impl HippoGraphConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_save_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            save_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::with_save_dir(data_dir);

        if let Some(v) = env_parse("HIPPOGRAPH_LINKING_TOP_K") {
            config.linking_top_k = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_RETRIEVAL_TOP_K") {
            config.retrieval_top_k = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_DAMPING") {
            config.damping = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_PASSAGE_NODE_WEIGHT") {
            config.passage_node_weight = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_SYNONYMY_THRESHOLD") {
            config.synonymy_edge_sim_threshold = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_SYNONYMY_TOPK") {
            config.synonymy_edge_topk = v;
        }
        if let Some(v) = env_parse("HIPPOGRAPH_TIMEOUT_MS") {
            config.operation_timeout_ms = Some(v);
        }
        if let Ok(name) = std::env::var("HIPPOGRAPH_EXTRACTION_MODEL") {
            config.extraction_model_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::Config("embedding_dim must be positive".into()));
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(Error::Config(format!(
                "damping must be in (0, 1), got {}",
                self.damping
            )));
        }
        if self.passage_node_weight < 0.0 {
            return Err(Error::Config("passage_node_weight must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.synonymy_edge_sim_threshold) {
            return Err(Error::Config(
                "synonymy_edge_sim_threshold must be in [0, 1]".into(),
            ));
        }
        if self.ppr_max_iterations == 0 {
            return Err(Error::Config("ppr_max_iterations must be positive".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}
