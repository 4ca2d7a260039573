//! Candidate Engine: produces an ordered, deterministic list of actions
//! from the current vocabulary, its pairwise similarities, and per-type
//! value scores. Pure function — no I/O.

use std::collections::HashMap;

use crate::vocab::VocabularyType;

/// A single proposed action, in the priority band it was produced under.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// A zero-usage, non-builtin type: delete outright, no reasoner.
    AutoPrune { name: String },
    /// A pair where one side has zero usage and similarity clears the
    /// strong threshold: merge without consulting the reasoner. `deprecated`
    /// is the zero-usage side.
    AutoMerge { deprecated: String, target: String, similarity: f32 },
    /// A pair in the moderate-to-strong similarity band: ask the reasoner
    /// whether to merge, and if so, in which direction.
    ReasonerEvaluate { a: String, b: String, similarity: f32 },
    /// A single low-value, non-builtin type: ask the reasoner whether to
    /// deprecate it outright (no merge target).
    LowValue { name: String, value_score: f32 },
}

impl Candidate {
    /// The name used to break ties within a priority band: the candidate's
    /// "target" name when one exists, otherwise its sole name.
    fn tie_break_target(&self) -> &str {
        match self {
            Candidate::AutoPrune { name } => name,
            Candidate::AutoMerge { target, .. } => target,
            Candidate::ReasonerEvaluate { a, b, .. } => {
                if a <= b {
                    b
                } else {
                    a
                }
            }
            Candidate::LowValue { name, .. } => name,
        }
    }

    fn tie_break_deprecated(&self) -> &str {
        match self {
            Candidate::AutoPrune { name } => name,
            Candidate::AutoMerge { deprecated, .. } => deprecated,
            Candidate::ReasonerEvaluate { a, b, .. } => {
                if a <= b {
                    a
                } else {
                    b
                }
            }
            Candidate::LowValue { name, .. } => name,
        }
    }

    fn similarity(&self) -> f32 {
        match self {
            Candidate::AutoMerge { similarity, .. } | Candidate::ReasonerEvaluate { similarity, .. } => *similarity,
            Candidate::AutoPrune { .. } | Candidate::LowValue { .. } => 1.0,
        }
    }

    /// A stable identity for this candidate within one invocation,
    /// independent of which priority band produced it. Used by the
    /// controller to recognize "the same candidate, re-ranked from
    /// identical state" and avoid retrying it forever when its outcome
    /// doesn't mutate the graph.
    pub fn identity_key(&self) -> String {
        match self {
            Candidate::AutoPrune { name } => format!("prune:{name}"),
            Candidate::AutoMerge { deprecated, target, .. } => format!("merge:{deprecated}:{target}"),
            Candidate::ReasonerEvaluate { a, b, .. } => {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                format!("pair:{lo}:{hi}")
            }
            Candidate::LowValue { name, .. } => format!("lowvalue:{name}"),
        }
    }
}

/// Inputs this engine consumes: the vocabulary listing from the Graph
/// Adapter, the Scoring Kernel's pairwise similarities, and per-type value
/// scores (already combining usage, bridge count, and grounding).
pub struct VocabularySnapshot<'a> {
    pub types: &'a [VocabularyType],
    pub pairwise_similarities: &'a [(String, String, f32)],
    pub value_scores: &'a HashMap<String, f32>,
}

/// Thresholds and the aggressiveness multiplier that scales them.
pub struct RankingConfig {
    pub similarity_strong: f32,
    pub low_value_threshold: f32,
    pub aggressiveness: f64,
    /// Base cap on candidates produced per invocation at `aggressiveness == 1.0`.
    pub base_candidate_cap: usize,
}

fn sort_within_band(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.similarity()
            .partial_cmp(&a.similarity())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tie_break_target().cmp(b.tie_break_target()))
            .then_with(|| a.tie_break_deprecated().cmp(b.tie_break_deprecated()))
    });
    candidates
}

/// Produce the ordered candidate list: auto-prune, then auto-merge, then
/// reasoner-evaluate, then low-value, each band internally tie-broken by
/// descending similarity, ascending target name, ascending deprecated name.
/// The aggressiveness multiplier scales `low_value_threshold` upward (a
/// more aggressive pass is pickier about what counts as "low value", which
/// paradoxically *widens* the low-value band as vocabulary pressure rises)
/// and caps the total candidates returned.
pub fn rank_candidates(snapshot: &VocabularySnapshot<'_>, config: &RankingConfig) -> Vec<Candidate> {
    let by_name: HashMap<&str, &VocabularyType> = snapshot.types.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut auto_prune = Vec::new();
    for t in snapshot.types {
        if t.is_auto_prune_eligible() {
            auto_prune.push(Candidate::AutoPrune { name: t.name.as_str().to_string() });
        }
    }
    let auto_prune = sort_within_band(auto_prune);

    let mut auto_merge = Vec::new();
    let mut reasoner_evaluate = Vec::new();
    for (a, b, sim) in snapshot.pairwise_similarities {
        let (Some(ta), Some(tb)) = (by_name.get(a.as_str()), by_name.get(b.as_str())) else {
            continue;
        };
        // A builtin is pinned and can never be the deprecated side (I3,
        // spec §8): only a non-builtin, zero-usage side is eligible here.
        let a_auto_eligible = !ta.is_builtin && ta.usage_count == 0;
        let b_auto_eligible = !tb.is_builtin && tb.usage_count == 0;
        if *sim >= config.similarity_strong && (a_auto_eligible || b_auto_eligible) {
            let (deprecated, target) = if a_auto_eligible { (a, b) } else { (b, a) };
            auto_merge.push(Candidate::AutoMerge {
                deprecated: deprecated.clone(),
                target: target.clone(),
                similarity: *sim,
            });
            continue;
        }
        // A pair where both sides are builtin can never be actioned — no
        // side is ever eligible to become the deprecated one — so it is
        // not worth a reasoner round trip either.
        if ta.is_builtin && tb.is_builtin {
            continue;
        }
        reasoner_evaluate.push(Candidate::ReasonerEvaluate { a: a.clone(), b: b.clone(), similarity: *sim });
    }
    let auto_merge = sort_within_band(auto_merge);
    let reasoner_evaluate = sort_within_band(reasoner_evaluate);

    let effective_low_value_threshold = (config.low_value_threshold as f64 * config.aggressiveness) as f32;
    let mut low_value = Vec::new();
    for t in snapshot.types {
        if t.is_builtin {
            continue;
        }
        let score = snapshot.value_scores.get(t.name.as_str()).copied().unwrap_or(f32::MAX);
        if score < effective_low_value_threshold {
            low_value.push(Candidate::LowValue { name: t.name.as_str().to_string(), value_score: score });
        }
    }
    low_value.sort_by(|a, b| match (a, b) {
        (Candidate::LowValue { value_score: sa, name: na }, Candidate::LowValue { value_score: sb, name: nb }) => {
            sa.partial_cmp(sb).unwrap_or(std::cmp::Ordering::Equal).then_with(|| na.cmp(nb))
        }
        _ => std::cmp::Ordering::Equal,
    });

    let cap = ((config.base_candidate_cap as f64 * config.aggressiveness.max(0.1)).ceil() as usize).max(1);

    let mut all = Vec::with_capacity(auto_prune.len() + auto_merge.len() + reasoner_evaluate.len() + low_value.len());
    all.extend(auto_prune);
    all.extend(auto_merge);
    all.extend(reasoner_evaluate);
    all.extend(low_value);
    all.truncate(cap);
    all
}
