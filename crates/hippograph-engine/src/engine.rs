//! `HippoGraph`: owns the stores, graph and caches behind one facade.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use hippograph_core::{Error, HippoGraphConfig, IndexPaths, NodeKind, Result, Triple};
use hippograph_extract::{ExtractionResultCache, HeuristicOpenIe, OpenIe};
use hippograph_infer::{create_embedder, Embedder, QueryEmbeddingCache};
use hippograph_store::{
    EmbeddingStore, GraphEdge, GraphEngine, GraphNode, PetgraphEngine, SqliteEmbeddingStore,
};

use crate::builder::IndexBuilder;
use crate::pending::{CommitSummary, PendingSet};
use crate::rerank::{PassthroughReranker, Reranker};
use crate::types::EngineStats;

/// External models the engine calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub openie: Arc<dyn OpenIe>,
    pub reranker: Arc<dyn Reranker>,
}

impl Collaborators {
    /// The built-in local models named by `config`.
    pub fn local(config: &HippoGraphConfig) -> Self {
        Self {
            embedder: create_embedder(&config.embedding_model_name, config.embedding_dim),
            openie: Arc::new(HeuristicOpenIe::new()),
            reranker: Arc::new(PassthroughReranker),
        }
    }
}

/// Everything `HippoGraph` is assembled from.
pub struct EngineParts {
    pub paths: IndexPaths,
    pub chunk_store: Arc<dyn EmbeddingStore>,
    pub entity_store: Arc<dyn EmbeddingStore>,
    pub fact_store: Arc<dyn EmbeddingStore>,
    pub graph: Box<dyn GraphEngine>,
    pub collaborators: Collaborators,
}

/// Lookup tables built lazily before the first query after a change.
#[derive(Debug, Default)]
pub(crate) struct RetrievalState {
    pub(crate) ready: bool,
    /// Node id → position in `GraphEngine::node_ids` order.
    pub(crate) node_position: HashMap<String, usize>,
    pub(crate) vertex_count: usize,
    pub(crate) passage_keys: Vec<String>,
    pub(crate) passage_contents: HashMap<String, String>,
    pub(crate) fact_keys: Vec<String>,
    /// Parsed facts aligned with `fact_keys`.
    pub(crate) facts: Vec<Triple>,
    pub(crate) fact_position: HashMap<String, usize>,
}

/// A persistent graph-augmented retrieval index.
pub struct HippoGraph {
    pub(crate) config: HippoGraphConfig,
    pub(crate) paths: IndexPaths,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) openie: Arc<dyn OpenIe>,
    pub(crate) reranker: Arc<dyn Reranker>,
    pub(crate) chunk_store: Arc<dyn EmbeddingStore>,
    pub(crate) entity_store: Arc<dyn EmbeddingStore>,
    pub(crate) fact_store: Arc<dyn EmbeddingStore>,
    pub(crate) graph: Box<dyn GraphEngine>,
    pub(crate) extraction_cache: ExtractionResultCache,
    pub(crate) builder: IndexBuilder,
    pub(crate) retrieval: RetrievalState,
    pub(crate) query_cache: QueryEmbeddingCache,
}

impl HippoGraph {
    /// Open (or create) the index under `config.save_dir` with local models.
    pub fn open(config: HippoGraphConfig) -> Result<Self> {
        let collaborators = Collaborators::local(&config);
        Self::open_with(config, collaborators)
    }

    /// Open with caller-supplied models and SQLite-backed stores.
    pub fn open_with(config: HippoGraphConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let paths = IndexPaths::new(&config).map_err(|e| {
            Error::Initialization(format!(
                "Cannot create index directories under {}: {}",
                config.save_dir.display(),
                e
            ))
        })?;

        let embedder = collaborators.embedder.clone();
        let open_store = |dir: &std::path::Path, namespace: &str| {
            SqliteEmbeddingStore::open(dir, namespace, embedder.clone())
                .map(|s| Arc::new(s) as Arc<dyn EmbeddingStore>)
                .map_err(|e| {
                    Error::Initialization(format!("Cannot open {} store: {}", namespace, e))
                })
        };
        let chunk_store = open_store(&paths.chunk_store, "chunk")?;
        let entity_store = open_store(&paths.entity_store, "entity")?;
        let fact_store = open_store(&paths.fact_store, "fact")?;
        let graph = PetgraphEngine::load_or_create(&paths.graph_file, config.is_directed_graph)?;

        Self::from_parts(
            config,
            EngineParts {
                paths,
                chunk_store,
                entity_store,
                fact_store,
                graph: Box::new(graph),
                collaborators,
            },
        )
    }

    /// Assemble from prebuilt parts.
    pub fn from_parts(config: HippoGraphConfig, parts: EngineParts) -> Result<Self> {
        config.validate()?;
        let extraction_cache = ExtractionResultCache::new(&parts.paths.extraction_file);

        // Persisted edges carry the accumulated weights across restarts.
        let mut builder = IndexBuilder::new();
        let seeded = builder.load_edges(parts.graph.edges());
        builder.rebuild_entity_index(&extraction_cache.load());

        info!(
            "HippoGraph opened at {}: extraction={}, embedding={}, {} vertices, {} edges",
            parts.paths.working_dir.display(),
            parts.collaborators.openie.model_name(),
            config.embedding_model_name,
            parts.graph.vcount(),
            seeded
        );

        Ok(Self {
            config,
            paths: parts.paths,
            embedder: parts.collaborators.embedder,
            openie: parts.collaborators.openie,
            reranker: parts.collaborators.reranker,
            chunk_store: parts.chunk_store,
            entity_store: parts.entity_store,
            fact_store: parts.fact_store,
            graph: parts.graph,
            extraction_cache,
            builder,
            retrieval: RetrievalState::default(),
            query_cache: QueryEmbeddingCache::default(),
        })
    }

    pub fn config(&self) -> &HippoGraphConfig {
        &self.config
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn graph(&self) -> &dyn GraphEngine {
        self.graph.as_ref()
    }

    pub fn chunk_store(&self) -> &dyn EmbeddingStore {
        self.chunk_store.as_ref()
    }

    pub fn entity_store(&self) -> &dyn EmbeddingStore {
        self.entity_store.as_ref()
    }

    pub fn fact_store(&self) -> &dyn EmbeddingStore {
        self.fact_store.as_ref()
    }

    pub fn builder(&self) -> &IndexBuilder {
        &self.builder
    }

    pub fn extraction_cache(&self) -> &ExtractionResultCache {
        &self.extraction_cache
    }

    /// Whether lookup tables are current; false after any index or delete.
    pub fn is_ready_to_retrieve(&self) -> bool {
        self.retrieval.ready
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let (hits, misses) = self.query_cache.counters();
        Ok(EngineStats {
            chunks: self.chunk_store.stat()?.count,
            entities: self.entity_store.stat()?.count,
            facts: self.fact_store.stat()?.count,
            extraction_records: self.extraction_cache.load().len(),
            accumulated_edges: self.builder.edge_count(),
            graph: self.graph.stats(),
            query_cache_hits: hits,
            query_cache_misses: misses,
        })
    }

    /// Drop lookup tables and cached query vectors.
    pub(crate) fn invalidate_retrieval(&mut self) {
        self.retrieval = RetrievalState::default();
        self.query_cache.clear();
    }

    /// Stage every store row missing from the graph and every accumulated
    /// edge whose weight differs from the graph, then commit them together.
    pub(crate) fn materialize(&mut self) -> Result<CommitSummary> {
        let mut pending = PendingSet::new();

        let stores = [
            (&self.chunk_store, NodeKind::Passage),
            (&self.entity_store, NodeKind::Entity),
            (&self.fact_store, NodeKind::Fact),
        ];
        for (store, kind) in stores {
            for doc in store.list()? {
                if !self.graph.has_node(&doc.id) {
                    pending.stage_node(GraphNode::new(doc.id, kind, doc.content));
                }
            }
        }

        let mut dangling = 0;
        for (key, weight) in self.builder.edges() {
            if key.source == key.target {
                continue;
            }
            let source_known =
                self.graph.has_node(&key.source) || pending.is_staged_node(&key.source);
            let target_known =
                self.graph.has_node(&key.target) || pending.is_staged_node(&key.target);
            if !(source_known && target_known) {
                dangling += 1;
                continue;
            }
            if self.graph.edge_weight(&key.source, &key.target) == Some(weight) {
                continue;
            }
            pending.stage_edge(GraphEdge::new(key.source.clone(), key.target.clone(), weight));
        }
        if dangling > 0 {
            warn!("{} accumulated edges reference unknown nodes", dangling);
        }

        Ok(pending.commit(self.graph.as_mut()))
    }

    pub(crate) fn save_graph(&self) -> Result<()> {
        self.graph.serialize(&self.paths.graph_file)
    }
}
