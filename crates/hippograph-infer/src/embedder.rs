//! Embedding model trait and the built-in hashing embedder.

use ndarray::Array1;
use sha2::{Digest, Sha256};

use hippograph_core::text::normalize_text;
use hippograph_core::Result;

/// Trait for embedding backends.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Embed a batch of texts. One vector per input, same order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embed a retrieval query. Defaults to `embed`.
    fn embed_query(&self, text: &str) -> Result<Array1<f32>> {
        self.embed(text)
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder over word tokens and character trigrams.
///
/// Deterministic across processes: bucket and sign come from SHA-256 of
/// the feature string. Output is L2-normalized; empty text yields a zero
/// vector.
pub struct HashingEmbedder {
    dim: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(raw);
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut v = Array1::<f32>::zeros(self.dim);
        let normalized = normalize_text(text);

        for token in normalized.split_whitespace() {
            let (i, sign) = self.bucket(token);
            v[i] += sign * WORD_WEIGHT;

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                let (i, sign) = self.bucket(&gram);
                v[i] += sign * TRIGRAM_WEIGHT;
            }
        }

        let norm = v.dot(&v).sqrt();
        if norm > 1e-9 {
            v /= norm;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        a.dot(b)
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let e = HashingEmbedder::new(128);
        let a = e.embed("Acme Corp builds rockets").unwrap();
        let b = e.embed("acme corp builds rockets!").unwrap();
        assert_eq!(a, b);
        assert!((a.dot(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_similar_text_scores_higher() {
        let e = HashingEmbedder::new(384);
        let q = e.embed("acme corporation").unwrap();
        let near = e.embed("acme corp").unwrap();
        let far = e.embed("river delta sediment").unwrap();
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16);
        let v = e.embed("   ").unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_batch_matches_single() {
        let e = HashingEmbedder::new(64);
        let batch = e.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch[1], e.embed("two").unwrap());
    }
}
