//! Transport-independent API layer.
//!
//! `VocabLifecycleEngine` is the single entry point for all consumer-facing
//! operations. Transports (MCP, CLI) call its methods — they never reach
//! into the Lifecycle Controller, Epistemic Classifier, or the profile
//! store directly.

use regex::Regex;

use crate::adapter::GraphAdapter;
use crate::classifier::{self, ClassificationReport};
use crate::config::ConfigStore;
use crate::controller::{CancellationToken, ConsolidateParams, ConsolidationResult, LifecycleController};
use crate::embedding::EmbeddingService;
use crate::error::{EngineError, EngineResult};
use crate::profiles::{ProfileResult, ProfileStore};
use crate::reasoner::ReasoningProvider;
use crate::vocab::{AggressivenessProfile, VocabularyFilter, VocabularyType};

/// Single entry point for all consumer-facing operations: `consolidate`,
/// `measure_epistemic`, `list_vocabulary`, and profile CRUD (spec.md §6).
pub struct VocabLifecycleEngine {
    adapter: Box<dyn GraphAdapter>,
    embedder: EmbeddingService,
    reasoner: Box<dyn ReasoningProvider>,
    config_store: Box<dyn ConfigStore>,
    profiles: Box<dyn ProfileStore>,
}

impl VocabLifecycleEngine {
    pub fn new(
        adapter: Box<dyn GraphAdapter>,
        embedder: EmbeddingService,
        reasoner: Box<dyn ReasoningProvider>,
        config_store: Box<dyn ConfigStore>,
        profiles: Box<dyn ProfileStore>,
    ) -> Self {
        Self { adapter, embedder, reasoner, config_store, profiles }
    }

    /// Main loop: drive the vocabulary toward `params.target_size`.
    pub async fn consolidate(&self, params: ConsolidateParams, cancel: &CancellationToken) -> EngineResult<ConsolidationResult> {
        let config = self.config_store.load()?;
        let profile = self.resolve_profile(&config.aggressiveness_profile)?;
        let controller = LifecycleController::new(self.adapter.as_ref(), &self.embedder, self.reasoner.as_ref(), &config, &profile);
        controller.consolidate(params, cancel).await
    }

    /// Standalone C4 run: classify every active type's grounding
    /// distribution without going through the consolidation loop.
    pub fn measure_epistemic(&self, sample_size: usize, seed: u64, store: bool) -> EngineResult<ClassificationReport> {
        let config = self.config_store.load()?;
        let pattern = Regex::new(&config.historical_predicate_pattern)
            .map_err(|e| EngineError::InvalidConfig(format!("historical_predicate_pattern: {e}")))?;
        Ok(classifier::measure(self.adapter.as_ref(), sample_size, config.grounding_depth_limit, &pattern, seed, store)?)
    }

    /// Read-through to the Graph Adapter for clients.
    pub fn list_vocabulary(&self, filter: &VocabularyFilter) -> EngineResult<Vec<VocabularyType>> {
        Ok(self.adapter.list_vocabulary(filter)?)
    }

    /// Profile CRUD: read any, create/delete non-builtin.
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }

    pub fn create_profile(&self, profile: AggressivenessProfile) -> ProfileResult<()> {
        self.profiles.create(profile)
    }

    pub fn delete_profile(&self, name: &str) -> ProfileResult<()> {
        self.profiles.delete(name)
    }

    fn resolve_profile(&self, name: &str) -> EngineResult<AggressivenessProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| EngineError::InvalidConfig(format!("unknown aggressiveness_profile: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryGraphAdapter;
    use crate::config::StaticConfigStore;
    use crate::config::VocabConfig;
    use crate::embedding::MockEmbeddingProvider;
    use crate::profiles::InMemoryProfileStore;
    use crate::reasoner::MockReasoningProvider;
    use crate::vocab::Category;

    fn engine() -> VocabLifecycleEngine {
        let adapter = InMemoryGraphAdapter::with_builtins();
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));
        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        VocabLifecycleEngine::new(
            Box::new(adapter),
            embedder,
            Box::new(reasoner),
            Box::new(StaticConfigStore(VocabConfig::default())),
            Box::new(InMemoryProfileStore::new()),
        )
    }

    #[tokio::test]
    async fn consolidate_runs_end_to_end_through_the_facade() {
        let e = engine();
        let result = e
            .consolidate(ConsolidateParams { target_size: 30, dry_run: false, prune_unused: true, seed: 1 }, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.final_size <= result.initial_size);
    }

    #[test]
    fn measure_epistemic_without_store_does_not_mutate_status() {
        let e = engine();
        let before = e.list_vocabulary(&VocabularyFilter::default()).unwrap();
        let before_status: Vec<_> = before.iter().map(|t| t.status_measured_at).collect();
        e.measure_epistemic(50, 1, false).unwrap();
        let after = e.list_vocabulary(&VocabularyFilter::default()).unwrap();
        let after_status: Vec<_> = after.iter().map(|t| t.status_measured_at).collect();
        assert_eq!(before_status, after_status);
    }

    #[test]
    fn list_vocabulary_reads_through_to_the_adapter() {
        let e = engine();
        let types = e.list_vocabulary(&VocabularyFilter { include_builtin: true, ..Default::default() }).unwrap();
        assert!(types.iter().any(|t| t.name.as_str() == "ENTAILS"));
    }

    #[test]
    fn unknown_aggressiveness_profile_is_an_invalid_config_error() {
        let adapter = InMemoryGraphAdapter::with_builtins();
        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        let mut config = VocabConfig::default();
        config.aggressiveness_profile = "nonexistent".to_string();
        let e = VocabLifecycleEngine::new(
            Box::new(adapter),
            embedder,
            Box::new(reasoner),
            Box::new(StaticConfigStore(config)),
            Box::new(InMemoryProfileStore::new()),
        );
        let result = futures_block(e.consolidate(ConsolidateParams::default(), &CancellationToken::new()));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    fn futures_block<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
    }

    #[test]
    fn builtin_profile_cannot_be_deleted_through_the_facade() {
        let e = engine();
        assert!(e.delete_profile("balanced").is_err());
    }

    #[test]
    fn custom_profile_can_be_created_through_the_facade() {
        let e = engine();
        e.create_profile(AggressivenessProfile::new("gentle", 0.2, 0.0, 0.8, 0.5)).unwrap();
        assert!(e.profiles().get("gentle").is_some());
    }
}
