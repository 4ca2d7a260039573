//! Decision Executor: dispatches reasoner-eligible candidates to the
//! reasoning provider, applies accepted merges/deprecations atomically
//! through the Graph Adapter, and labels every recorded decision with its
//! true origin (auto, ai, heuristic) so a heuristic fallback can never be
//! mistaken for an AI decision.

use std::collections::HashMap;
use std::time::Duration;

use crate::adapter::{GraphAdapter, StorageError};
use crate::candidate::Candidate;
use crate::reasoner::{ReasonRequest, ReasonResponse, ReasonerDecision, ReasonerError, ReasoningProvider};
use crate::vocab::Category;

/// Where a recorded decision came from. Set once, at the dispatch site,
/// and never overwritten downstream — the fix for a source bug that
/// reported heuristic fallbacks as AI decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOrigin {
    Auto,
    Ai,
    Heuristic,
}

/// A merge actually applied (or, under `dry_run`, one that would be
/// applied) by the executor.
#[derive(Debug, Clone)]
pub struct ExecutedMerge {
    pub deprecated: String,
    pub target: String,
    pub similarity: f32,
    pub rationale: String,
    pub edges_rewritten: u64,
    pub origin: DecisionOrigin,
}

/// A type actually pruned (or, under `dry_run`, one that would be pruned).
#[derive(Debug, Clone)]
pub struct PrunedType {
    pub name: String,
    pub origin: DecisionOrigin,
}

/// A candidate that was considered but not applied, with the rationale
/// the reasoner (or the executor's own directionality rule) gave.
#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub description: String,
    pub rationale: String,
}

/// The terminal state of a single candidate's pass through the executor.
#[derive(Debug, Clone)]
pub enum Outcome {
    Merged(ExecutedMerge),
    Pruned(PrunedType),
    Rejected(RejectedCandidate),
    /// A per-candidate transport/precondition failure. Per §7, this never
    /// terminates the invocation — the controller records it and moves on.
    Failed { description: String, error: String },
}

/// Per-type context the executor needs to shape a reasoner prompt and to
/// pick a merge direction when the candidate itself doesn't fix one (the
/// `ReasonerEvaluate` band proposes a direction but the reasoner's
/// response carries no directionality of its own).
#[derive(Debug, Clone, Default)]
pub struct CandidateContext {
    pub value_scores: HashMap<String, f32>,
    pub usage_counts: HashMap<String, u64>,
    pub bridge_counts: HashMap<String, u64>,
    pub categories: HashMap<String, Category>,
    /// Names of builtin (pinned) types, so a proposed merge direction can
    /// never select one as the deprecated side (I3, spec §8).
    pub builtins: std::collections::HashSet<String>,
}

impl CandidateContext {
    fn value_of(&self, name: &str) -> f32 {
        self.value_scores.get(name).copied().unwrap_or(0.0)
    }

    fn usage_of(&self, name: &str) -> u64 {
        self.usage_counts.get(name).copied().unwrap_or(0)
    }

    fn bridge_of(&self, name: &str) -> u64 {
        self.bridge_counts.get(name).copied().unwrap_or(0)
    }

    fn same_category(&self, a: &str, b: &str) -> Option<bool> {
        match (self.categories.get(a), self.categories.get(b)) {
            (Some(ca), Some(cb)) => Some(ca.as_str() == cb.as_str()),
            _ => None,
        }
    }

    /// The proposed deprecated/target direction for a pair: the lower
    /// value-score side is proposed as deprecated (spec §4.5 default
    /// direction), ties broken toward the lexicographically later name so
    /// the choice is deterministic. A builtin side is never proposed as
    /// deprecated (I3, spec §8) regardless of its value score.
    fn proposed_direction<'a>(&self, a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        let (a_builtin, b_builtin) = (self.builtins.contains(a), self.builtins.contains(b));
        if a_builtin && !b_builtin {
            return (b, a);
        }
        if b_builtin && !a_builtin {
            return (a, b);
        }
        let (va, vb) = (self.value_of(a), self.value_of(b));
        if va < vb || (va == vb && a > b) {
            (a, b)
        } else {
            (b, a)
        }
    }
}

pub struct DecisionExecutor<'a> {
    adapter: &'a dyn GraphAdapter,
    reasoner: &'a dyn ReasoningProvider,
    merge_auto_threshold: f32,
    similarity_strong: f32,
    provider_timeout: Duration,
}

impl<'a> DecisionExecutor<'a> {
    pub fn new(
        adapter: &'a dyn GraphAdapter,
        reasoner: &'a dyn ReasoningProvider,
        merge_auto_threshold: f32,
        similarity_strong: f32,
        provider_timeout: Duration,
    ) -> Self {
        Self { adapter, reasoner, merge_auto_threshold, similarity_strong, provider_timeout }
    }

    /// Execute one candidate, mutating the graph through the adapter.
    pub async fn execute(&self, candidate: &Candidate, ctx: &CandidateContext) -> Outcome {
        match candidate {
            Candidate::AutoPrune { name } => self.run_prune(name, DecisionOrigin::Auto),
            Candidate::AutoMerge { deprecated, target, similarity } => {
                self.run_merge(deprecated, target, *similarity, "zero-usage side auto-merged at or above the strong-similarity threshold".to_string(), DecisionOrigin::Auto)
            }
            Candidate::ReasonerEvaluate { a, b, similarity } => {
                self.execute_reasoner_evaluate(a, b, *similarity, ctx).await
            }
            Candidate::LowValue { name, .. } => self.execute_low_value(name, ctx).await,
        }
    }

    /// Decide what *would* happen without mutating the graph (`dry_run`).
    /// Reasoner-eligible candidates are still dispatched — a dry run must
    /// observe the same reasoner decisions a live run would — only the
    /// adapter write is skipped.
    pub async fn decide_only(&self, candidate: &Candidate, ctx: &CandidateContext) -> Outcome {
        match candidate {
            Candidate::AutoPrune { name } => {
                Outcome::Pruned(PrunedType { name: name.clone(), origin: DecisionOrigin::Auto })
            }
            Candidate::AutoMerge { deprecated, target, similarity } => Outcome::Merged(ExecutedMerge {
                deprecated: deprecated.clone(),
                target: target.clone(),
                similarity: *similarity,
                rationale: "zero-usage side auto-merged at or above the strong-similarity threshold".to_string(),
                edges_rewritten: 0,
                origin: DecisionOrigin::Auto,
            }),
            Candidate::ReasonerEvaluate { a, b, similarity } => {
                let (deprecated, target) = ctx.proposed_direction(a, b);
                let request = self.build_pair_request(a, b, *similarity, ctx);
                match self.dispatch(&request).await {
                    Dispatched::Ai(response) => self.judge_pair_response(&response, deprecated, target, *similarity, DecisionOrigin::Ai),
                    Dispatched::Heuristic => self.heuristic_pair_decision(deprecated, target, *similarity),
                }
            }
            Candidate::LowValue { name, .. } => {
                let request = self.build_single_request(name, ctx);
                match self.dispatch(&request).await {
                    Dispatched::Ai(response) => self.judge_low_value_response(&response, name, DecisionOrigin::Ai),
                    Dispatched::Heuristic => Outcome::Rejected(RejectedCandidate {
                        description: format!("deprecate {name}"),
                        rationale: "reasoning provider unavailable; heuristic declines low-value deprecation without corroborating evidence".to_string(),
                    }),
                }
            }
        }
    }

    fn run_prune(&self, name: &str, origin: DecisionOrigin) -> Outcome {
        match self.adapter.prune_type(name) {
            Ok(()) => Outcome::Pruned(PrunedType { name: name.to_string(), origin }),
            Err(e) => Outcome::Failed { description: format!("prune {name}"), error: describe_storage_error(&e) },
        }
    }

    fn run_merge(&self, deprecated: &str, target: &str, similarity: f32, rationale: String, origin: DecisionOrigin) -> Outcome {
        match self.adapter.rewrite_edge_labels(deprecated, target) {
            Ok(edges_rewritten) => Outcome::Merged(ExecutedMerge {
                deprecated: deprecated.to_string(),
                target: target.to_string(),
                similarity,
                rationale,
                edges_rewritten,
                origin,
            }),
            Err(e) => Outcome::Failed { description: format!("merge {deprecated} -> {target}"), error: describe_storage_error(&e) },
        }
    }

    async fn execute_reasoner_evaluate(&self, a: &str, b: &str, similarity: f32, ctx: &CandidateContext) -> Outcome {
        let (deprecated, target) = ctx.proposed_direction(a, b);
        let request = self.build_pair_request(a, b, similarity, ctx);
        match self.dispatch(&request).await {
            Dispatched::Ai(response) => match self.judge_pair_response(&response, deprecated, target, similarity, DecisionOrigin::Ai) {
                Outcome::Merged(m) => self.run_merge(&m.deprecated, &m.target, m.similarity, m.rationale, DecisionOrigin::Ai),
                other => other,
            },
            Dispatched::Heuristic => match self.heuristic_pair_decision(deprecated, target, similarity) {
                Outcome::Merged(m) => self.run_merge(&m.deprecated, &m.target, m.similarity, m.rationale, DecisionOrigin::Heuristic),
                other => other,
            },
        }
    }

    async fn execute_low_value(&self, name: &str, ctx: &CandidateContext) -> Outcome {
        let request = self.build_single_request(name, ctx);
        match self.dispatch(&request).await {
            Dispatched::Ai(response) => match self.judge_low_value_response(&response, name, DecisionOrigin::Ai) {
                Outcome::Pruned(p) => self.run_deactivate(&p.name, DecisionOrigin::Ai),
                other => other,
            },
            Dispatched::Heuristic => Outcome::Rejected(RejectedCandidate {
                description: format!("deprecate {name}"),
                rationale: "reasoning provider unavailable; heuristic declines low-value deprecation without corroborating evidence".to_string(),
            }),
        }
    }

    fn run_deactivate(&self, name: &str, origin: DecisionOrigin) -> Outcome {
        match self.adapter.deactivate_type(name) {
            Ok(()) => Outcome::Pruned(PrunedType { name: name.to_string(), origin }),
            Err(e) => Outcome::Failed { description: format!("deprecate {name}"), error: describe_storage_error(&e) },
        }
    }

    /// Shared prompt-shaping + response-dispatch helper for every
    /// reasoner-eligible candidate kind (spec §4.6's de-duplication
    /// requirement: one helper, not one per candidate kind).
    async fn dispatch(&self, request: &ReasonRequest) -> Dispatched {
        if !self.reasoner.is_available().await {
            return Dispatched::Heuristic;
        }
        match tokio::time::timeout(self.provider_timeout, self.reasoner.reason(request)).await {
            Ok(Ok(response)) => Dispatched::Ai(response),
            Ok(Err(_)) | Err(_) => Dispatched::Heuristic,
        }
    }

    fn build_pair_request(&self, a: &str, b: &str, similarity: f32, ctx: &CandidateContext) -> ReasonRequest {
        ReasonRequest {
            type_a: a.to_string(),
            type_b: Some(b.to_string()),
            similarity: Some(similarity),
            usage_a: ctx.usage_of(a),
            usage_b: Some(ctx.usage_of(b)),
            bridge_count_a: ctx.bridge_of(a),
            bridge_count_b: Some(ctx.bridge_of(b)),
            same_category: ctx.same_category(a, b),
            instruction: "Decide whether these two relationship types denote the same semantic relation and should be merged.".to_string(),
        }
    }

    fn build_single_request(&self, name: &str, ctx: &CandidateContext) -> ReasonRequest {
        ReasonRequest {
            type_a: name.to_string(),
            type_b: None,
            similarity: None,
            usage_a: ctx.usage_of(name),
            usage_b: None,
            bridge_count_a: ctx.bridge_of(name),
            bridge_count_b: None,
            same_category: None,
            instruction: "This relationship type has a low composite value score. Decide whether it should be deprecated.".to_string(),
        }
    }

    fn judge_pair_response(&self, response: &ReasonResponse, deprecated: &str, target: &str, similarity: f32, origin: DecisionOrigin) -> Outcome {
        if response.confidence < self.merge_auto_threshold {
            return Outcome::Rejected(RejectedCandidate {
                description: format!("merge {deprecated} -> {target}"),
                rationale: format!("confidence {:.2} below auto threshold: {}", response.confidence, response.reasoning),
            });
        }
        match response.decision {
            ReasonerDecision::Merge => Outcome::Merged(ExecutedMerge {
                deprecated: deprecated.to_string(),
                target: target.to_string(),
                similarity,
                rationale: response.reasoning.clone(),
                edges_rewritten: 0,
                origin,
            }),
            ReasonerDecision::Skip | ReasonerDecision::Deprecate => Outcome::Rejected(RejectedCandidate {
                description: format!("merge {deprecated} -> {target}"),
                rationale: response.reasoning.clone(),
            }),
        }
    }

    fn judge_low_value_response(&self, response: &ReasonResponse, name: &str, origin: DecisionOrigin) -> Outcome {
        if response.confidence < self.merge_auto_threshold {
            return Outcome::Rejected(RejectedCandidate {
                description: format!("deprecate {name}"),
                rationale: format!("confidence {:.2} below auto threshold: {}", response.confidence, response.reasoning),
            });
        }
        match response.decision {
            ReasonerDecision::Deprecate => Outcome::Pruned(PrunedType { name: name.to_string(), origin }),
            ReasonerDecision::Merge | ReasonerDecision::Skip => Outcome::Rejected(RejectedCandidate {
                description: format!("deprecate {name}"),
                rationale: response.reasoning.clone(),
            }),
        }
    }

    /// Deterministic fallback when the provider is unavailable: decide on
    /// similarity alone against `similarity_strong`. Always labeled
    /// `heuristic`, never `ai` — the corrected honesty bug of spec §9.
    fn heuristic_pair_decision(&self, deprecated: &str, target: &str, similarity: f32) -> Outcome {
        if similarity >= self.similarity_strong {
            Outcome::Merged(ExecutedMerge {
                deprecated: deprecated.to_string(),
                target: target.to_string(),
                similarity,
                rationale: "heuristic fallback: similarity at or above the strong threshold".to_string(),
                edges_rewritten: 0,
                origin: DecisionOrigin::Heuristic,
            })
        } else {
            Outcome::Rejected(RejectedCandidate {
                description: format!("merge {deprecated} -> {target}"),
                rationale: "heuristic fallback: similarity below the strong threshold".to_string(),
            })
        }
    }
}

enum Dispatched {
    Ai(ReasonResponse),
    Heuristic,
}

fn describe_storage_error(e: &StorageError) -> String {
    e.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryGraphAdapter;
    use crate::reasoner::{MockReasoningProvider, ReasonerDecision};
    use crate::vocab::{Category, GraphEdge, VocabularyType};

    fn ctx() -> CandidateContext {
        CandidateContext::default()
    }

    #[tokio::test]
    async fn auto_prune_deletes_the_type() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));
        let reasoner = MockReasoningProvider::unavailable();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.9, 0.9, Duration::from_secs(1));
        let outcome = executor.execute(&Candidate::AutoPrune { name: "ENTAILS".to_string() }, &ctx()).await;
        assert!(matches!(outcome, Outcome::Pruned(_)));
        assert!(adapter.get_type("ENTAILS").unwrap().is_none());
    }

    #[tokio::test]
    async fn auto_merge_rewrites_edges_without_consulting_reasoner() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("OLD", Category::Other));
        adapter.seed_type(VocabularyType::new_custom("NEW", Category::Other));
        adapter.seed_edge(GraphEdge { id: "e1".into(), source: "a".into(), target: "b".into(), label: "OLD".into(), confidence: 0.9 });
        let reasoner = MockReasoningProvider::unavailable();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.9, 0.9, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::AutoMerge { deprecated: "OLD".to_string(), target: "NEW".to_string(), similarity: 0.95 }, &ctx())
            .await;
        match outcome {
            Outcome::Merged(m) => {
                assert_eq!(m.origin, DecisionOrigin::Auto);
                assert_eq!(m.edges_rewritten, 1);
            }
            _ => panic!("expected Merged"),
        }
    }

    #[tokio::test]
    async fn reasoner_accept_above_threshold_merges_in_proposed_direction() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("DEFINED_AS", Category::Logical));
        adapter.seed_type(VocabularyType::new_custom("DEFINED", Category::Logical));
        let reasoner = MockReasoningProvider::available().with_response(
            "DEFINED",
            ReasonResponse { decision: ReasonerDecision::Merge, reasoning: "same meaning".to_string(), confidence: 0.95 },
        );
        let mut c = ctx();
        c.value_scores.insert("DEFINED_AS".to_string(), 5.0);
        c.value_scores.insert("DEFINED".to_string(), 1.0);
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.90, 0.90, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::ReasonerEvaluate { a: "DEFINED".to_string(), b: "DEFINED_AS".to_string(), similarity: 0.82 }, &c)
            .await;
        match outcome {
            Outcome::Merged(m) => {
                assert_eq!(m.deprecated, "DEFINED");
                assert_eq!(m.target, "DEFINED_AS");
                assert_eq!(m.origin, DecisionOrigin::Ai);
            }
            other => panic!("expected Merged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_builtin_is_never_proposed_as_deprecated_even_with_the_lower_value_score() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_builtin("IMPLIES", Category::Logical));
        adapter.seed_type(VocabularyType::new_custom("ENTAILS", Category::Logical));
        let reasoner = MockReasoningProvider::unavailable();
        let mut c = ctx();
        c.builtins.insert("IMPLIES".to_string());
        // IMPLIES scores lower, which would normally make it the proposed
        // deprecated side, but I3 pins every builtin active regardless.
        c.value_scores.insert("IMPLIES".to_string(), 0.1);
        c.value_scores.insert("ENTAILS".to_string(), 5.0);
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.90, 0.90, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::ReasonerEvaluate { a: "IMPLIES".to_string(), b: "ENTAILS".to_string(), similarity: 0.95 }, &c)
            .await;
        match outcome {
            Outcome::Merged(m) => {
                assert_eq!(m.deprecated, "ENTAILS");
                assert_eq!(m.target, "IMPLIES");
            }
            other => panic!("expected Merged, got {other:?}"),
        }
        assert!(adapter.get_type("IMPLIES").unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn reasoner_skip_is_rejected_with_rationale() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("HAS_PART", Category::Composition));
        adapter.seed_type(VocabularyType::new_custom("PART_OF", Category::Composition));
        let reasoner = MockReasoningProvider::available().with_response(
            "HAS_PART",
            ReasonResponse { decision: ReasonerDecision::Skip, reasoning: "opposing directionality".to_string(), confidence: 0.97 },
        );
        let c = ctx();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.90, 0.90, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::ReasonerEvaluate { a: "HAS_PART".to_string(), b: "PART_OF".to_string(), similarity: 0.88 }, &c)
            .await;
        match outcome {
            Outcome::Rejected(r) => assert!(r.rationale.contains("opposing directionality")),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_timeout_falls_back_to_heuristic_and_is_labeled_honestly() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("A", Category::Other));
        adapter.seed_type(VocabularyType::new_custom("B", Category::Other));
        let reasoner = MockReasoningProvider::available(); // no response registered -> ParseError -> heuristic
        let c = ctx();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.90, 0.90, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::ReasonerEvaluate { a: "A".to_string(), b: "B".to_string(), similarity: 0.86 }, &c)
            .await;
        match outcome {
            Outcome::Rejected(r) => assert!(r.rationale.contains("heuristic")),
            other => panic!("expected heuristic-labeled Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unavailable_provider_merges_via_heuristic_above_strong_threshold() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("A", Category::Other));
        adapter.seed_type(VocabularyType::new_custom("B", Category::Other));
        let reasoner = MockReasoningProvider::unavailable();
        let c = ctx();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.90, 0.90, Duration::from_secs(1));
        let outcome = executor
            .execute(&Candidate::ReasonerEvaluate { a: "A".to_string(), b: "B".to_string(), similarity: 0.95 }, &c)
            .await;
        match outcome {
            Outcome::Merged(m) => assert_eq!(m.origin, DecisionOrigin::Heuristic),
            other => panic!("expected heuristic Merged, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dry_run_decision_does_not_mutate_the_adapter() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("OLD", Category::Other));
        adapter.seed_type(VocabularyType::new_custom("NEW", Category::Other));
        adapter.seed_edge(GraphEdge { id: "e1".into(), source: "a".into(), target: "b".into(), label: "OLD".into(), confidence: 0.9 });
        let reasoner = MockReasoningProvider::unavailable();
        let executor = DecisionExecutor::new(&adapter, &reasoner, 0.9, 0.9, Duration::from_secs(1));
        let _outcome = executor
            .decide_only(&Candidate::AutoMerge { deprecated: "OLD".to_string(), target: "NEW".to_string(), similarity: 0.95 }, &ctx())
            .await;
        assert_eq!(adapter.count_edges_by_label("OLD").unwrap(), 1);
        assert!(adapter.get_type("OLD").unwrap().unwrap().is_active);
    }
}
