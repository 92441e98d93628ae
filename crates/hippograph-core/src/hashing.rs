//! Content-addressed identifiers for chunks, entities and facts.
//!
//! An id is `<prefix><sha256-hex(content)>`, so indexing the same content
//! twice always lands on the same node.

use sha2::{Digest, Sha256};

use crate::text::normalize_text;
use crate::types::{NodeKind, Triple};

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// `prefix` followed by the content hash.
pub fn compute_hash_id(content: &str, prefix: &str) -> String {
    format!("{}{}", prefix, content_hash(content))
}

/// Id of a passage chunk. The text is hashed verbatim.
pub fn chunk_id(text: &str) -> String {
    compute_hash_id(text, NodeKind::Passage.prefix())
}

/// Id of an entity. The name is normalized before hashing.
pub fn entity_id(name: &str) -> String {
    compute_hash_id(&normalize_text(name), NodeKind::Entity.prefix())
}

/// Id of a fact, hashed from its canonical JSON form.
pub fn fact_id(triple: &Triple) -> String {
    compute_hash_id(&triple.to_json(), NodeKind::Fact.prefix())
}

/// Map a caller-supplied chunk reference onto a `chunk-` id.
pub fn canonical_chunk_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("chunk-") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("passage-") {
        format!("chunk-{}", rest)
    } else {
        format!("chunk-{}", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_is_deterministic() {
        let a = entity_id("Acme Corp");
        let b = entity_id("  acme   corp. ");
        assert_eq!(a, b);
        assert!(a.starts_with("entity-"));
        assert_eq!(a.len(), "entity-".len() + 64);
    }

    #[test]
    fn test_fact_id_depends_on_all_parts() {
        let a = fact_id(&Triple::new("a", "b", "c"));
        let b = fact_id(&Triple::new("a", "b", "d"));
        assert_ne!(a, b);
        assert_eq!(a, fact_id(&Triple::new("a", "b", "c")));
    }

    #[test]
    fn test_chunk_id_hashes_verbatim() {
        assert_ne!(chunk_id("Text"), chunk_id("text"));
        assert!(chunk_id("Text").starts_with("chunk-"));
    }

    #[test]
    fn test_canonical_chunk_id() {
        let id = chunk_id("some passage");
        let hash = id.trim_start_matches("chunk-");
        assert_eq!(canonical_chunk_id(&id), id);
        assert_eq!(canonical_chunk_id(hash), id);
        assert_eq!(canonical_chunk_id(&format!("passage-{}", hash)), id);
    }
}
