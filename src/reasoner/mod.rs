//! Reasoning Provider: the pluggable, async dispatch target for
//! reasoner-evaluate and low-value candidates.

pub mod mock;
pub mod subprocess;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::MockReasoningProvider;
pub use subprocess::SubprocessReasoningProvider;

#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("reasoning provider not available: {0}")]
    Unavailable(String),

    #[error("invocation failed: {0}")]
    InvocationFailed(String),

    #[error("response parse error: {0}")]
    ParseError(String),
}

/// What the reasoner recommends for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerDecision {
    Merge,
    Skip,
    Deprecate,
}

/// The structured request sent to the reasoning provider: enough context
/// to decide without the provider needing its own graph access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonRequest {
    pub type_a: String,
    pub type_b: Option<String>,
    pub similarity: Option<f32>,
    pub usage_a: u64,
    pub usage_b: Option<u64>,
    pub bridge_count_a: u64,
    pub bridge_count_b: Option<u64>,
    pub same_category: Option<bool>,
    pub instruction: String,
}

/// The reasoner's structured response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonResponse {
    pub decision: ReasonerDecision,
    pub reasoning: String,
    pub confidence: f32,
}

/// Abstracts over transport (subprocess, HTTP, mock) for the reasoning
/// backend the Decision Executor consults.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn reason(&self, request: &ReasonRequest) -> Result<ReasonResponse, ReasonerError>;
}
