//! Production embedding provider backed by fastembed (ONNX Runtime),
//! compiled only under the `embeddings` feature.

use super::{EmbeddingError, EmbeddingProvider};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed` method
/// requires `&mut self`, while `EmbeddingProvider` uses `&self`.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    dim: usize,
    model_id: String,
}

impl FastEmbedEmbedder {
    pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
        let model_id = format!("{model:?}");
        let options = InitOptions::new(model).with_show_download_progress(false);
        let mut embedding = TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
        let dim = embedding
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::ModelError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResult)?
            .len();
        Ok(Self {
            model: Mutex::new(embedding),
            dim,
            model_id,
        })
    }

    /// Default model: nomic-embed-text-v1.5.
    pub fn default_model() -> Result<Self, EmbeddingError> {
        Self::new(EmbeddingModel::NomicEmbedTextV15)
    }
}

impl EmbeddingProvider for FastEmbedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().unwrap();
        let embeddings = model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
        if embeddings.is_empty() {
            return Err(EmbeddingError::EmptyResult);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
