//! Graph Adapter: the only component that mutates persistent state.

use crate::vocab::{AttributePatch, GraphEdge, VocabularyFilter, VocabularyType};
use thiserror::Error;

/// Errors that can occur during graph store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("type not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("date parsing error: {0}")]
    DateParse(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// The only component that mutates persistent state.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait GraphAdapter: Send + Sync {
    /// Deterministic listing (stable sort by name) for reproducible
    /// candidate ranking.
    fn list_vocabulary(&self, filter: &VocabularyFilter) -> StorageResult<Vec<VocabularyType>>;

    fn get_type(&self, name: &str) -> StorageResult<Option<VocabularyType>>;

    fn count_edges_by_label(&self, name: &str) -> StorageResult<u64>;

    /// Uniform-random sample of up to `n` edges bearing `name` as a label,
    /// using a caller-provided seed for reproducibility.
    fn sample_edges(&self, name: &str, n: usize, seed: u64) -> StorageResult<Vec<GraphEdge>>;

    /// Edges incident to a concept node, used by the Epistemic Classifier's
    /// bounded recursion into a target concept's neighborhood. `limit`
    /// bounds the fan-out at each recursion level.
    fn incident_edges(&self, concept_id: &str, limit: usize) -> StorageResult<Vec<GraphEdge>>;

    /// Rewrite every edge labeled `deprecated` to `target` and deactivate
    /// `deprecated`. Atomic: all-or-nothing. Returns the number of edges
    /// rewritten.
    fn rewrite_edge_labels(&self, deprecated: &str, target: &str) -> StorageResult<u64>;

    /// Deactivate a type. Fails if builtin or if it still has live edges.
    fn deactivate_type(&self, name: &str) -> StorageResult<()>;

    /// Delete a type record. Fails if `usage_count > 0` or builtin.
    fn prune_type(&self, name: &str) -> StorageResult<()>;

    /// Last-writer-wins patch of a type's mutable attributes.
    fn update_type_attributes(&self, name: &str, patch: &AttributePatch) -> StorageResult<()>;

    /// Strictly increasing integer used to timestamp `status_measured_at`.
    fn bump_measurement_epoch(&self) -> StorageResult<u64>;
}
