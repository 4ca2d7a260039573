//! Epistemic Classifier: classifies each vocabulary type by the grounding
//! distribution on its edges.

use std::collections::HashSet;

use regex::Regex;

use crate::adapter::{GraphAdapter, StorageResult};
use crate::vocab::{AttributePatch, EpistemicStats, EpistemicStatus, TypeName};

/// How many incident edges are inspected at each recursion level when
/// computing an edge's grounding. Bounds fan-out independently of
/// `grounding_depth_limit`, which bounds recursion depth.
const GROUNDING_FANOUT: usize = 10;

/// How much a deeper level's contribution is discounted relative to the
/// direct edge it was reached through.
const DEPTH_DECAY: f64 = 0.5;

/// Per-type classification outcome, ready for persistence.
#[derive(Debug, Clone)]
pub struct TypeClassification {
    pub name: TypeName,
    pub status: EpistemicStatus,
    pub stats: EpistemicStats,
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationReport {
    pub classifications: Vec<TypeClassification>,
    pub epoch: u64,
}

/// Compute a single edge's grounding value in `[-1, 1]`: positive for
/// supporting context, negative for contradicting. Recursion unrolls into
/// the target concept's neighborhood, decaying each additional hop's
/// contribution, and stops at `depth_limit` or on revisiting a concept
/// already on the current path (cycle breaking via a visited set fresh
/// per sampled edge).
fn edge_grounding(adapter: &dyn GraphAdapter, concept_id: &str, depth_remaining: usize, visited: &mut HashSet<String>) -> StorageResult<f64> {
    if depth_remaining == 0 {
        return Ok(0.0);
    }
    if !visited.insert(concept_id.to_string()) {
        return Ok(0.0);
    }
    let incident = adapter.incident_edges(concept_id, GROUNDING_FANOUT)?;
    if incident.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for e in &incident {
        let direct = 2.0 * e.confidence as f64 - 1.0;
        let next_concept = if e.source == concept_id { &e.target } else { &e.source };
        let deeper = edge_grounding(adapter, next_concept, depth_remaining - 1, visited)?;
        total += direct + DEPTH_DECAY * deeper;
    }
    Ok((total / incident.len() as f64).clamp(-1.0, 1.0))
}

/// Classify a type's aggregate stats into one of seven states, evaluated
/// top-down. The historical-name override is checked after the
/// distribution-shape rules; a type whose stats land in the narrow gap
/// between `WEAK_GROUNDING` and `WELL_GROUNDED` (moderate mean, low
/// variance) with a non-historical name falls back to `MIXED_GROUNDING`.
fn classify(stats: &EpistemicStats, name: &TypeName, historical_pattern: &Regex) -> EpistemicStatus {
    if stats.count < 3 {
        return EpistemicStatus::InsufficientData;
    }
    if stats.mean < -0.5 {
        return EpistemicStatus::Contradicted;
    }
    if stats.mean < 0.0 {
        return EpistemicStatus::PoorlyGrounded;
    }
    if stats.mean < 0.15 {
        return EpistemicStatus::WeakGrounding;
    }
    if stats.mean <= 0.8 && stats.std >= 0.25 {
        return EpistemicStatus::MixedGrounding;
    }
    if stats.mean > 0.8 {
        return EpistemicStatus::WellGrounded;
    }
    if historical_pattern.is_match(name.as_str()) {
        return EpistemicStatus::Historical;
    }
    EpistemicStatus::MixedGrounding
}

/// Sample up to `sample_size` edges per active type, classify each type's
/// grounding distribution, and, when `store` is true, persist
/// status/stats/measurement epoch via the adapter. With `store = false`
/// the epoch is still bumped (callers treat it as the report's identity)
/// but no type record is written — a read-only classification pass.
pub fn measure(
    adapter: &dyn GraphAdapter,
    sample_size: usize,
    grounding_depth_limit: usize,
    historical_pattern: &Regex,
    seed: u64,
    store: bool,
) -> StorageResult<ClassificationReport> {
    // Builtins are always active (I3) and must still be classified (spec
    // §4.4 step 1: "for every active type"), so include them explicitly.
    let filter = crate::vocab::VocabularyFilter { include_builtin: true, ..Default::default() };
    let types = adapter.list_vocabulary(&filter)?;
    let epoch = adapter.bump_measurement_epoch()?;

    let mut classifications = Vec::with_capacity(types.len());
    for t in &types {
        let edges = adapter.sample_edges(t.name.as_str(), sample_size, seed)?;
        let mut samples = Vec::with_capacity(edges.len());
        for e in &edges {
            let mut visited = HashSet::new();
            samples.push(edge_grounding(adapter, &e.target, grounding_depth_limit, &mut visited)?);
        }
        let stats = EpistemicStats::from_samples(&samples);
        let status = classify(&stats, &t.name, historical_pattern);

        if store {
            let patch = AttributePatch::new().with_epistemic(status, stats, epoch);
            adapter.update_type_attributes(t.name.as_str(), &patch)?;
        }

        classifications.push(TypeClassification { name: t.name.clone(), status, stats });
    }

    Ok(ClassificationReport { classifications, epoch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryGraphAdapter;
    use crate::vocab::{Category, GraphEdge, VocabularyType};

    fn historical_pattern() -> Regex {
        Regex::new(r"(?i)^HISTORICALLY_").unwrap()
    }

    #[test]
    fn insufficient_data_when_fewer_than_three_samples() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("RARE", Category::Other));
        adapter.seed_edge(GraphEdge { id: "e1".into(), source: "a".into(), target: "b".into(), label: "RARE".into(), confidence: 0.9 });

        let report = measure(&adapter, 50, 2, &historical_pattern(), 1, true).unwrap();
        let c = report.classifications.iter().find(|c| c.name.as_str() == "RARE").unwrap();
        assert_eq!(c.status, EpistemicStatus::InsufficientData);
    }

    #[test]
    fn well_grounded_when_high_confidence_edges_dominate() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("SOLID", Category::Other));
        for i in 0..5 {
            adapter.seed_edge(GraphEdge {
                id: format!("e{i}"),
                source: format!("a{i}"),
                target: format!("b{i}"),
                label: "SOLID".into(),
                confidence: 0.98,
            });
        }
        let report = measure(&adapter, 50, 2, &historical_pattern(), 7, true).unwrap();
        let c = report.classifications.iter().find(|c| c.name.as_str() == "SOLID").unwrap();
        assert_eq!(c.status, EpistemicStatus::WellGrounded);
    }

    #[test]
    fn contradicted_when_low_confidence_edges_dominate() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("SHAKY", Category::Other));
        for i in 0..5 {
            adapter.seed_edge(GraphEdge {
                id: format!("e{i}"),
                source: format!("a{i}"),
                target: format!("b{i}"),
                label: "SHAKY".into(),
                confidence: 0.02,
            });
        }
        let report = measure(&adapter, 50, 2, &historical_pattern(), 3, true).unwrap();
        let c = report.classifications.iter().find(|c| c.name.as_str() == "SHAKY").unwrap();
        assert_eq!(c.status, EpistemicStatus::Contradicted);
    }

    #[test]
    fn measurement_epoch_is_persisted_on_each_type() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("X", Category::Other));
        for i in 0..3 {
            adapter.seed_edge(GraphEdge { id: format!("e{i}"), source: "a".into(), target: "b".into(), label: "X".into(), confidence: 0.5 });
        }
        let report = measure(&adapter, 50, 2, &historical_pattern(), 9, true).unwrap();
        let stored = adapter.get_type("X").unwrap().unwrap();
        assert_eq!(stored.status_measured_at, Some(report.epoch));
    }

    #[test]
    fn grounding_recursion_terminates_on_cycles() {
        let adapter = InMemoryGraphAdapter::new();
        adapter.seed_type(VocabularyType::new_custom("LOOP", Category::Other));
        adapter.seed_edge(GraphEdge { id: "e1".into(), source: "a".into(), target: "b".into(), label: "LOOP".into(), confidence: 0.7 });
        adapter.seed_edge(GraphEdge { id: "e2".into(), source: "b".into(), target: "a".into(), label: "LOOP".into(), confidence: 0.7 });
        adapter.seed_edge(GraphEdge { id: "e3".into(), source: "a".into(), target: "b".into(), label: "LOOP".into(), confidence: 0.7 });

        let report = measure(&adapter, 50, 5, &historical_pattern(), 5, true).unwrap();
        assert!(report.classifications.iter().any(|c| c.name.as_str() == "LOOP"));
    }
}
