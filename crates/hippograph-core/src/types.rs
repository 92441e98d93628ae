//! Shared value types: triples and node kinds.

use serde::{Deserialize, Serialize};

use crate::text::normalize_text;

/// Kind of a graph vertex. Determines the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Passage,
    Fact,
}

impl NodeKind {
    /// Prefix used for content-addressed ids of this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Entity => "entity-",
            NodeKind::Passage => "chunk-",
            NodeKind::Fact => "fact-",
        }
    }

    /// Infer the kind from an id prefix.
    pub fn from_id(id: &str) -> Option<Self> {
        if id.starts_with("entity-") {
            Some(NodeKind::Entity)
        } else if id.starts_with("chunk-") || id.starts_with("passage-") {
            Some(NodeKind::Passage)
        } else if id.starts_with("fact-") {
            Some(NodeKind::Fact)
        } else {
            None
        }
    }
}

/// A (subject, predicate, object) fact.
///
/// Serializes as a three-element JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Build a normalized triple from raw extractor output.
    ///
    /// Returns `None` unless there are exactly three elements and each
    /// normalizes to a non-empty string.
    pub fn from_raw(raw: &[String]) -> Option<Self> {
        if raw.len() != 3 {
            return None;
        }
        let parts: Vec<String> = raw.iter().map(|s| normalize_text(s)).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        let mut it = parts.into_iter();
        Some(Self {
            subject: it.next()?,
            predicate: it.next()?,
            object: it.next()?,
        })
    }

    /// Canonical JSON text (`["s","p","o"]`). Fact ids hash this.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&(&self.subject, &self.predicate, &self.object))
            .unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Subject and object; the two entity mentions of the fact.
    pub fn entities(&self) -> [&str; 2] {
        [&self.subject, &self.object]
    }
}

impl From<(String, String, String)> for Triple {
    fn from((subject, predicate, object): (String, String, String)) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl From<Triple> for (String, String, String) {
    fn from(t: Triple) -> Self {
        (t.subject, t.predicate, t.object)
    }
}

/// Normalize a batch of raw triples, dropping malformed ones and duplicates.
/// Order of first appearance is kept.
pub fn normalize_triples(raw: &[Vec<String>]) -> Vec<Triple> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .filter_map(|t| Triple::from_raw(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
