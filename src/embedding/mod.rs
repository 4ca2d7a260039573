//! Embedding Service: produces and caches vectors for type names, with
//! rigorous dimension discipline.

#[cfg(feature = "embeddings")]
mod fastembed_impl;
pub mod mock;

use thiserror::Error;

use crate::adapter::GraphAdapter;
use crate::vocab::{AttributePatch, VocabularyType};

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;
pub use mock::MockEmbeddingProvider;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    ModelError(String),

    #[error("no embedding provider configured")]
    Unavailable,
}

/// A pluggable, synchronous text-embedding backend. Never suspends: the
/// engine's logical API treats this call as its sole mandatory blocking
/// point, so an async runtime wraps it at the boundary rather than inside
/// the provider itself.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per text, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The fixed dimension this provider produces, read from its own
    /// configuration rather than inferred from any vector it has produced.
    fn dimension(&self) -> usize;

    /// Identifies the embedding model, so a cached vector can be detected
    /// as stale after a model change even when the dimension happens to
    /// coincide.
    fn model_id(&self) -> &str;
}

/// Produces and caches per-type embeddings through a `GraphAdapter`.
///
/// `expected_dimension` is captured once at construction from the active
/// provider, never from the first vector observed in the cache — the fix
/// for a bootstrap ordering bug where an empty cache let the first
/// differently-sized vector silently define the expected dimension.
pub struct EmbeddingService {
    provider: Box<dyn EmbeddingProvider>,
    expected_dimension: usize,
}

impl EmbeddingService {
    pub fn new(provider: Box<dyn EmbeddingProvider>) -> Self {
        let expected_dimension = provider.dimension();
        Self { provider, expected_dimension }
    }

    pub fn expected_dimension(&self) -> usize {
        self.expected_dimension
    }

    /// Synchronous embed of raw text. Never suspends beyond the provider
    /// call itself.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.provider.embed_batch(&[text])?;
        vectors.pop().ok_or(EmbeddingError::EmptyResult)
    }

    /// Returns the cached embedding for `vtype` if present and labeled with
    /// the current model id and the right dimension; otherwise computes it
    /// from the type's name (or `"{name}: {description}"` when a
    /// description is supplied) and persists it through the adapter.
    pub fn embedding_for(
        &self,
        adapter: &dyn GraphAdapter,
        vtype: &VocabularyType,
        description: Option<&str>,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if let (Some(cached), Some(model_id)) = (&vtype.embedding, &vtype.embedding_model_id) {
            if model_id == self.provider.model_id() && cached.len() == self.expected_dimension {
                return Ok(cached.clone());
            }
        }

        let text = match description {
            Some(d) => format!("{}: {}", vtype.name, d),
            None => vtype.name.to_string(),
        };
        let vector = self.embed(&text)?;
        if vector.len() != self.expected_dimension {
            return Err(EmbeddingError::ModelError(format!(
                "provider returned dimension {}, expected {}",
                vector.len(),
                self.expected_dimension
            )));
        }

        let patch = AttributePatch::new().with_embedding(vector.clone(), self.provider.model_id());
        if adapter.update_type_attributes(vtype.name.as_str(), &patch).is_err() {
            // Persistence failure does not invalidate the freshly computed
            // vector; the caller still gets a correctly-dimensioned result
            // for this invocation, and the next read will recompute.
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryGraphAdapter;
    use crate::vocab::Category;

    #[test]
    fn embed_returns_provider_dimension() {
        let service = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(8)));
        let v = service.embed("IMPLIES").unwrap();
        assert_eq!(v.len(), 8);
    }

    #[test]
    fn embedding_for_computes_and_persists_on_first_call() {
        let adapter = InMemoryGraphAdapter::new();
        let t = VocabularyType::new_custom("ENTAILS", Category::Logical);
        adapter.seed_type(t.clone());
        let service = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));

        let v = service.embedding_for(&adapter, &t, None).unwrap();
        assert_eq!(v.len(), 4);

        let stored = adapter.get_type("ENTAILS").unwrap().unwrap();
        assert_eq!(stored.embedding, Some(v));
        assert_eq!(stored.embedding_model_id.as_deref(), Some(service.provider.model_id()));
    }

    #[test]
    fn embedding_for_reuses_cache_when_model_and_dimension_match() {
        let adapter = InMemoryGraphAdapter::new();
        let mut t = VocabularyType::new_custom("ENTAILS", Category::Logical);
        let service = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        t.embedding = Some(vec![1.0, 2.0, 3.0, 4.0]);
        t.embedding_model_id = Some(service.provider.model_id().to_string());

        let v = service.embedding_for(&adapter, &t, None).unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn embedding_for_repairs_a_mismatched_dimension() {
        let adapter = InMemoryGraphAdapter::new();
        let mut t = VocabularyType::new_custom("ENTAILS", Category::Logical);
        let service = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        t.embedding = Some(vec![1.0, 2.0]); // stale 2-dim vector
        t.embedding_model_id = Some(service.provider.model_id().to_string());

        let v = service.embedding_for(&adapter, &t, None).unwrap();
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn expected_dimension_comes_from_provider_not_first_observed_vector() {
        let service = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(16)));
        assert_eq!(service.expected_dimension(), 16);
    }
}
