//! Scoring Kernel: pure functions over vocabulary features. No I/O, no
//! mutation, no `&self` state.

use crate::error::{EngineError, EngineResult};
use crate::vocab::{Category, CategorySeed, VocabularyType};

/// Cosine similarity between two vectors of equal length, accumulated in
/// double precision to reduce drift on high-dimensional vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> EngineResult<f32> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// One type's name paired with its embedding, the minimal shape this
/// kernel's functions need out of a `VocabularyType`.
#[derive(Debug, Clone)]
pub struct ScoredType<'a> {
    pub name: &'a str,
    pub embedding: &'a [f32],
}

/// Every unordered pair with `sim ≥ threshold_moderate`, in deterministic
/// lexicographic order by `(name_a, name_b)`.
pub fn pairwise_similarities(types: &[ScoredType<'_>], threshold_moderate: f32) -> EngineResult<Vec<(String, String, f32)>> {
    let mut out = Vec::new();
    for i in 0..types.len() {
        for j in (i + 1)..types.len() {
            let (a, b) = if types[i].name <= types[j].name {
                (&types[i], &types[j])
            } else {
                (&types[j], &types[i])
            };
            let sim = cosine(a.embedding, b.embedding)?;
            if sim >= threshold_moderate {
                out.push((a.name.to_string(), b.name.to_string(), sim));
            }
        }
    }
    out.sort_by(|l, r| l.0.cmp(&r.0).then_with(|| l.1.cmp(&r.1)));
    Ok(out)
}

pub struct CategoryFit {
    pub best_category: Category,
    pub score: f32,
    pub runner_up: Category,
    pub runner_up_score: f32,
    pub ambiguous: bool,
}

/// Similarity to each category seed; `ambiguous = true` when the runner-up
/// score is at least 80% of the winning score.
pub fn category_fit(embedding: &[f32], seeds: &[CategorySeed]) -> EngineResult<CategoryFit> {
    let mut scored: Vec<(Category, f32)> = Vec::with_capacity(seeds.len());
    for seed in seeds {
        scored.push((seed.name, cosine(embedding, &seed.seed_embedding)?));
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (best_category, score) = scored.first().copied().unwrap_or((Category::Other, 0.0));
    let (runner_up, runner_up_score) = scored.get(1).copied().unwrap_or((best_category, 0.0));
    let ambiguous = score > 0.0 && runner_up_score >= 0.8 * score;
    Ok(CategoryFit { best_category, score, runner_up, runner_up_score, ambiguous })
}

/// Inputs to `value_score`, gathered by the caller from the Graph Adapter
/// and the Epistemic Classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueInputs {
    pub usage_count: u64,
    pub bridge_count: u64,
    pub grounding_mean: f64,
}

/// A composite score: monotonic non-decreasing in each input, and
/// insensitive to total vocabulary size so values compare across separate
/// consolidation passes.
///
/// `log(1 + usage_count)` rewards usage with diminishing returns;
/// `log(1 + bridge_count)` rewards types that connect otherwise-distant
/// subgraphs; `max(grounding_mean, 0.0)` folds in epistemic support without
/// letting a poorly-grounded type go negative overall.
pub fn value_score(inputs: ValueInputs) -> f32 {
    let usage_term = ((1.0 + inputs.usage_count as f64).ln()) as f32;
    let bridge_term = ((1.0 + inputs.bridge_count as f64).ln()) as f32;
    let grounding_term = inputs.grounding_mean.max(0.0) as f32;
    usage_term + bridge_term + grounding_term
}

/// Whether `a` and `b`, as read from the Graph Adapter, are eligible for
/// auto-merge consideration: same vocabulary, distinct names.
pub fn is_distinct_pair(a: &VocabularyType, b: &VocabularyType) -> bool {
    a.name != b.name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_rejects_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(matches!(cosine(&a, &b), Err(EngineError::DimensionMismatch { .. })));
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero_not_nan() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn pairwise_similarities_orders_lexicographically_and_filters_threshold() {
        let emb_a: Vec<f32> = vec![1.0, 0.0];
        let emb_b: Vec<f32> = vec![1.0, 0.0];
        let emb_c: Vec<f32> = vec![0.0, 1.0];
        let types = vec![
            ScoredType { name: "ZETA", embedding: &emb_a },
            ScoredType { name: "ALPHA", embedding: &emb_b },
            ScoredType { name: "GAMMA", embedding: &emb_c },
        ];
        let pairs = pairwise_similarities(&types, 0.5).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "ALPHA");
        assert_eq!(pairs[0].1, "ZETA");
    }

    #[test]
    fn value_score_is_monotonic_in_usage_count() {
        let low = value_score(ValueInputs { usage_count: 1, ..Default::default() });
        let high = value_score(ValueInputs { usage_count: 100, ..Default::default() });
        assert!(high > low);
    }

    #[test]
    fn value_score_never_goes_negative_from_poor_grounding() {
        let v = value_score(ValueInputs { usage_count: 0, bridge_count: 0, grounding_mean: -0.9 });
        assert!(v >= 0.0);
    }

    #[test]
    fn category_fit_flags_ambiguous_when_runner_up_is_close() {
        let seeds = vec![
            CategorySeed { name: Category::Logical, seed_text: vec![], seed_embedding: vec![1.0, 0.0] },
            CategorySeed { name: Category::Causation, seed_text: vec![], seed_embedding: vec![0.99, 0.01] },
        ];
        let fit = category_fit(&[1.0, 0.0], &seeds).unwrap();
        assert!(fit.ambiguous);
    }
}
