//! Deterministic mock embedding provider for tests.

use super::{EmbeddingError, EmbeddingProvider};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Produces a deterministic, content-derived vector of a fixed dimension.
/// Same text always yields the same vector; different texts, with high
/// probability, yield vectors with lower cosine similarity than two
/// near-duplicate texts (achieved by hashing overlapping trigrams into
/// vector slots).
pub struct MockEmbeddingProvider {
    dim: usize,
    model_id: String,
    call_count: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_id: "mock-embedding-v1".to_string(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_model_id(dim: usize, model_id: impl Into<String>) -> Self {
        Self {
            dim,
            model_id: model_id.into(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let bytes = text.to_lowercase();
        let bytes = bytes.as_bytes();
        if bytes.is_empty() {
            return v;
        }
        for window in bytes.windows(3.min(bytes.len())) {
            let mut h: u64 = 1469598103934665603;
            for b in window {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            let slot = (h as usize) % self.dim;
            v[slot] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_yields_identical_vector() {
        let p = MockEmbeddingProvider::new(32);
        let a = p.embed_batch(&["IMPLIES"]).unwrap();
        let b = p.embed_batch(&["IMPLIES"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn batch_preserves_order_and_length() {
        let p = MockEmbeddingProvider::new(16);
        let out = p.embed_batch(&["CAUSES", "PRECEDES", "NEAR"]).unwrap();
        assert_eq!(out.len(), 3);
        for v in &out {
            assert_eq!(v.len(), 16);
        }
    }

    #[test]
    fn empty_batch_returns_empty_without_incrementing_error_state() {
        let p = MockEmbeddingProvider::new(8);
        let out = p.embed_batch(&[]).unwrap();
        assert!(out.is_empty());
    }
}
