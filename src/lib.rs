//! Vocabulary Lifecycle Engine
//!
//! Governs the set of relationship-type names used as edge labels in a
//! content-addressed knowledge graph. As documents are ingested, an
//! upstream extractor invents new relationship types; left unmanaged this
//! set sprawls. The engine keeps the vocabulary within a configurable size
//! envelope while preserving the graph's relational semantics: scoring,
//! candidate ranking, reasoner dispatch, atomic merge/prune/deprecate
//! execution, embedding lifecycle, epistemic classification, and
//! aggressiveness control.
//!
//! # Components
//!
//! - **Graph Adapter** (`adapter`): the only component that mutates
//!   persistent state.
//! - **Embedding Service** (`embedding`): text → fixed-dimension vector,
//!   with dimension discipline.
//! - **Scoring Kernel** (`scoring`): pure similarity and value-score
//!   functions.
//! - **Epistemic Classifier** (`classifier`): grounding-based
//!   classification of vocabulary types.
//! - **Candidate Engine** (`candidate`): deterministic, priority-ordered
//!   action ranking.
//! - **Decision Executor** (`executor`): reasoner dispatch and atomic
//!   merge/prune/deprecate application.
//! - **Lifecycle Controller** (`controller`): the bounded consolidation
//!   loop.
//!
//! # Example
//!
//! ```
//! use vocab_lifecycle::VocabLifecycleEngine;
//! use vocab_lifecycle::adapter::InMemoryGraphAdapter;
//! use vocab_lifecycle::config::{StaticConfigStore, VocabConfig};
//! use vocab_lifecycle::embedding::{EmbeddingService, MockEmbeddingProvider};
//! use vocab_lifecycle::profiles::InMemoryProfileStore;
//! use vocab_lifecycle::reasoner::MockReasoningProvider;
//!
//! let engine = VocabLifecycleEngine::new(
//!     Box::new(InMemoryGraphAdapter::with_builtins()),
//!     EmbeddingService::new(Box::new(MockEmbeddingProvider::new(8))),
//!     Box::new(MockReasoningProvider::unavailable()),
//!     Box::new(StaticConfigStore(VocabConfig::default())),
//!     Box::new(InMemoryProfileStore::new()),
//! );
//! // Engine is ready for use.
//! ```

mod api;
pub mod adapter;
pub mod candidate;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod embedding;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod profiles;
pub mod reasoner;
pub mod scoring;
pub mod vocab;

pub use api::VocabLifecycleEngine;
pub use controller::{CancellationToken, ConsolidateParams, ConsolidationResult};
pub use error::{EngineError, EngineResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
