//! Crate-level error type
//!
//! Component-local errors (`StorageError`, `EmbeddingError`, `ReasonerError`)
//! convert into `EngineError` via `#[from]`, so callers can match on the
//! enum without chasing down each component's own error type.

use crate::adapter::StorageError;
use crate::embedding::EmbeddingError;
use crate::reasoner::ReasonerError;
use thiserror::Error;

/// Errors surfaced at the engine's public boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Adapter transport failed. Aborts the current invocation cleanly with
    /// partial results, except on the very first read where it aborts
    /// entirely.
    #[error("graph store unavailable: {0}")]
    GraphUnavailable(#[from] StorageError),

    /// Adapter precondition violated (builtin merge, live edges on a prune,
    /// stale epoch). Fails the current candidate; the invocation continues.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An embedding of the wrong dimension was encountered and could not be
    /// repaired.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// No embedding provider configured, or the provider is down.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// Reasoning provider down, timed out, or returned a malformed response.
    #[error("reasoner unavailable: {0}")]
    ReasonerUnavailable(#[from] ReasonerError),

    /// An out-of-range configuration parameter. Refused before any side
    /// effect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
