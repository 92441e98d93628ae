//! SQLite-backed embedding store with int8 vectors and in-memory cosine search.
//!
//! Each namespace lives in its own database file. Embeddings are stored
//! quantized; a normalized float matrix is rebuilt lazily after writes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use hippograph_core::{Error, Result};
use hippograph_infer::Embedder;

use crate::quantize::{dequantize_uint8, l2_normalize, quantize_uint8};
use crate::schema::SCHEMA_SQL;
use crate::types::{ScoredDocument, StoreDocument, StoreStat};
use crate::vector::EmbeddingStore;

/// Embedding store persisted in `<dir>/vdb_<namespace>.db`.
pub struct SqliteEmbeddingStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    namespace: String,
    embedder: Arc<dyn Embedder>,
    /// Pre-loaded normalized embedding matrix for vector search: (N, dim) float32.
    embedding_matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Row documents, aligned with matrix rows.
    docs: Vec<StoreDocument>,
    /// Whether the matrix needs reloading.
    dirty: bool,
}

impl SqliteEmbeddingStore {
    /// Open or create the store for `namespace` under `db_dir`.
    pub fn open(
        db_dir: impl AsRef<Path>,
        namespace: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(format!("vdb_{}.db", namespace));

        let conn = Self::create_connection(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let dim = embedder.dimension();
        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            namespace: namespace.to_string(),
            embedder,
            embedding_matrix: Mutex::new(EmbeddingMatrix {
                matrix: Array2::zeros((0, dim)),
                docs: Vec::new(),
                dirty: true,
            }),
        };

        info!(
            "Embedding store '{}' opened: {} rows, dim={}, path={}",
            store.namespace,
            store.count()?,
            dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -65536;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count as usize)
    }

    /// Fetch one document by id.
    pub fn get(&self, id: &str) -> Result<Option<StoreDocument>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT id, content FROM nodes WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let doc = stmt
            .query_row(params![id], |row| {
                Ok(StoreDocument {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(doc)
    }

    fn existing_ids(&self, ids: &[&str]) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT 1 FROM nodes WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut found = HashSet::new();
        for id in ids {
            let hit = stmt
                .query_row(params![id], |_| Ok(()))
                .optional()
                .map_err(|e| Error::Database(e.to_string()))?;
            if hit.is_some() {
                found.insert(id.to_string());
            }
        }
        Ok(found)
    }

    /// Load and normalize all embeddings into a matrix for fast search.
    fn load_embedding_matrix(&self) -> Result<()> {
        let mut docs = Vec::new();
        let mut embeddings: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT id, content, embedding, scale, offset_val FROM nodes ORDER BY rowid")
                .map_err(|e| Error::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let id: String = row.get(0)?;
                    let content: String = row.get(1)?;
                    let blob: Vec<u8> = row.get(2)?;
                    let scale: f64 = row.get(3)?;
                    let offset: f64 = row.get(4)?;
                    Ok((id, content, blob, scale as f32, offset as f32))
                })
                .map_err(|e| Error::Database(e.to_string()))?;

            for row in rows {
                let (id, content, blob, scale, offset) =
                    row.map_err(|e| Error::Database(e.to_string()))?;
                embeddings.push(l2_normalize(dequantize_uint8(&blob, scale, offset)));
                docs.push(StoreDocument { id, content });
            }
        }

        let dim = self.embedder.dimension();
        let mut matrix = Array2::zeros((embeddings.len(), dim));
        for (i, emb) in embeddings.iter().enumerate() {
            if emb.len() == dim {
                matrix.row_mut(i).assign(emb);
            }
        }

        let mut mat = self.embedding_matrix.lock();
        debug!("Loaded {} embeddings into '{}' matrix", docs.len(), self.namespace);
        mat.matrix = matrix;
        mat.docs = docs;
        mat.dirty = false;
        Ok(())
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        if self.embedding_matrix.lock().dirty {
            self.load_embedding_matrix()?;
        }
        Ok(())
    }

    fn mark_dirty(&self) {
        self.embedding_matrix.lock().dirty = true;
    }
}

impl EmbeddingStore for SqliteEmbeddingStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn add_documents(&self, docs: &[StoreDocument]) -> Result<usize> {
        let mut seen = HashSet::new();
        let unique: Vec<&StoreDocument> = docs.iter().filter(|d| seen.insert(&d.id)).collect();
        let ids: Vec<&str> = unique.iter().map(|d| d.id.as_str()).collect();
        let existing = self.existing_ids(&ids)?;
        let pending: Vec<&StoreDocument> = unique
            .into_iter()
            .filter(|d| !existing.contains(&d.id))
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = pending.iter().map(|d| d.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        let now = chrono::Utc::now().timestamp_millis();

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO nodes (id, content, embedding, scale, offset_val, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            for (doc, emb) in pending.iter().zip(embeddings.iter()) {
                let (bytes, scale, offset) = quantize_uint8(emb);
                stmt.execute(params![doc.id, doc.content, bytes, scale, offset, now])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        self.mark_dirty();
        debug!("Inserted {} rows into '{}'", pending.len(), self.namespace);
        Ok(pending.len())
    }

    fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;
        let mut deleted = 0;
        {
            let mut stmt = tx
                .prepare_cached("DELETE FROM nodes WHERE id = ?1")
                .map_err(|e| Error::Database(e.to_string()))?;
            for id in ids {
                deleted += stmt
                    .execute(params![id])
                    .map_err(|e| Error::Database(e.to_string()))?;
            }
        }
        tx.commit().map_err(|e| Error::Database(e.to_string()))?;
        drop(conn);

        if deleted > 0 {
            self.mark_dirty();
        }
        Ok(deleted)
    }

    fn list(&self) -> Result<Vec<StoreDocument>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT id, content FROM nodes ORDER BY rowid")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoreDocument {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        let docs = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(docs)
    }

    fn similarity_search_with_score(&self, text: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let query = self.embedder.embed_query(text)?;
        self.similarity_search_vector_with_score(&query, k)
    }

    fn similarity_search_vector_with_score(
        &self,
        query_embedding: &Array1<f32>,
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        self.ensure_matrix_loaded()?;

        let mat = self.embedding_matrix.lock();
        if mat.matrix.nrows() == 0 || k == 0 {
            return Ok(Vec::new());
        }
        if query_embedding.len() != mat.matrix.ncols() {
            return Err(Error::Embedding(format!(
                "query dimension {} does not match store dimension {}",
                query_embedding.len(),
                mat.matrix.ncols()
            )));
        }

        // Normalize query
        let q_norm = query_embedding.dot(query_embedding).sqrt();
        if q_norm < 1e-9 {
            return Ok(Vec::new());
        }
        let q = query_embedding / q_norm;

        // Matrix multiply: (N, dim) @ (dim,) → (N,)
        let similarities = mat.matrix.dot(&q);

        let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        indexed.truncate(k);

        Ok(indexed
            .into_iter()
            .map(|(i, s)| ScoredDocument {
                document: mat.docs[i].clone(),
                score: s as f64,
            })
            .collect())
    }

    fn stat(&self) -> Result<StoreStat> {
        Ok(StoreStat {
            namespace: self.namespace.clone(),
            count: self.count()?,
        })
    }
}
