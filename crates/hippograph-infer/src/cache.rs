//! LRU cache for query embeddings.
//!
//! Each query string is embedded once per index version. The engine
//! clears the cache whenever the graph changes.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

use hippograph_core::Result;

/// Cached embedding entry with timestamp.
struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache keyed by query text.
pub struct QueryEmbeddingCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    max_size: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, query: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == query) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }

    fn evict(&mut self, query: &str) {
        self.entries.remove(query);
        self.order.retain(|k| k != query);
    }
}

impl QueryEmbeddingCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: VecDeque::with_capacity(max_size),
                max_size: max_size.max(1),
                ttl,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Get a cached embedding. Returns None on miss or expired entry.
    pub fn get(&self, query: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;

        let fresh = inner
            .entries
            .get(query)
            .map(|e| (e.inserted_at.elapsed() < ttl, e.embedding.clone()));

        match fresh {
            Some((true, embedding)) => {
                inner.hits += 1;
                inner.touch(query);
                Some(embedding)
            }
            Some((false, _)) => {
                inner.misses += 1;
                inner.evict(query);
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert an embedding, evicting the least recently used entry at capacity.
    pub fn put(&self, query: String, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&query) {
            inner.touch(&query);
        } else {
            while inner.entries.len() >= inner.max_size {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(query.clone());
        }

        inner.entries.insert(
            query,
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Return the cached embedding or compute, store and return it.
    pub fn get_or_embed<F>(&self, query: &str, embed: F) -> Result<Array1<f32>>
    where
        F: FnOnce(&str) -> Result<Array1<f32>>,
    {
        if let Some(hit) = self.get(query) {
            return Ok(hit);
        }
        let embedding = embed(query)?;
        self.put(query.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn counters(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for QueryEmbeddingCache {
    /// 1000 entries, 1-hour TTL.
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}
