//! Database schema SQL for one embedding store namespace.

/// One row per stored node: content, quantized embedding, insertion time.
///
/// `rowid` order is insertion order and defines the store's key order.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    scale REAL NOT NULL,
    offset_val REAL NOT NULL,
    created_at INTEGER NOT NULL
);
"#;
