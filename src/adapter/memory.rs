//! In-memory Graph Adapter, useful for tests and as a deterministic fixture.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::adapter::{GraphAdapter, StorageError, StorageResult};
use crate::vocab::{AttributePatch, Category, GraphEdge, VocabularyFilter, VocabularyType};

/// A single in-process store, guarded by a read-write lock. Edges are kept
/// in insertion order; `list_vocabulary` sorts its output by name so callers
/// see a deterministic ordering regardless of insertion history.
pub struct InMemoryGraphAdapter {
    types: RwLock<HashMap<String, VocabularyType>>,
    edges: RwLock<Vec<GraphEdge>>,
    epoch: AtomicU64,
}

impl InMemoryGraphAdapter {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            edges: RwLock::new(Vec::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn seed_type(&self, t: VocabularyType) {
        self.types.write().unwrap().insert(t.name.as_str().to_string(), t);
    }

    pub fn seed_edge(&self, edge: GraphEdge) {
        self.edges.write().unwrap().push(edge);
    }

    /// Convenience constructor covering the builtin category anchors a fresh
    /// vocabulary starts with.
    pub fn with_builtins() -> Self {
        let store = Self::new();
        for (name, category) in [
            ("IMPLIES", Category::Logical),
            ("CONTAINS", Category::Composition),
            ("CAUSES", Category::Causation),
            ("PRECEDES", Category::Temporal),
            ("NEAR", Category::Spatial),
            ("SAME_AS", Category::Identity),
        ] {
            store.seed_type(VocabularyType::new_builtin(name, category));
        }
        store
    }
}

impl Default for InMemoryGraphAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic linear-congruential generator, used only to pick a
/// reproducible uniform sample without pulling a full RNG crate into the
/// read path of a test double.
fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state
}

impl GraphAdapter for InMemoryGraphAdapter {
    fn list_vocabulary(&self, filter: &VocabularyFilter) -> StorageResult<Vec<VocabularyType>> {
        let types = self.types.read().unwrap();
        let mut out: Vec<VocabularyType> = types
            .values()
            .filter(|t| filter.include_inactive || t.is_active)
            .filter(|t| filter.include_builtin || !t.is_builtin)
            .filter(|t| !filter.only_with_embeddings || t.embedding.is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(out)
    }

    fn get_type(&self, name: &str) -> StorageResult<Option<VocabularyType>> {
        Ok(self.types.read().unwrap().get(name).cloned())
    }

    fn count_edges_by_label(&self, name: &str) -> StorageResult<u64> {
        Ok(self.edges.read().unwrap().iter().filter(|e| e.label == name).count() as u64)
    }

    fn sample_edges(&self, name: &str, n: usize, seed: u64) -> StorageResult<Vec<GraphEdge>> {
        let matching: Vec<GraphEdge> = self
            .edges
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.label == name)
            .cloned()
            .collect();
        if matching.len() <= n {
            return Ok(matching);
        }
        let mut state = seed.max(1);
        let mut indices: Vec<usize> = (0..matching.len()).collect();
        for i in (1..indices.len()).rev() {
            let j = (lcg_next(&mut state) as usize) % (i + 1);
            indices.swap(i, j);
        }
        indices.truncate(n);
        Ok(indices.into_iter().map(|i| matching[i].clone()).collect())
    }

    fn incident_edges(&self, concept_id: &str, limit: usize) -> StorageResult<Vec<GraphEdge>> {
        let edges = self.edges.read().unwrap();
        Ok(edges
            .iter()
            .filter(|e| e.source == concept_id || e.target == concept_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn rewrite_edge_labels(&self, deprecated: &str, target: &str) -> StorageResult<u64> {
        {
            let types = self.types.read().unwrap();
            if let Some(t) = types.get(deprecated) {
                if t.is_builtin {
                    return Err(StorageError::Conflict(format!("{deprecated} is builtin")));
                }
            }
        }
        let mut edges = self.edges.write().unwrap();
        let mut n = 0u64;
        for e in edges.iter_mut() {
            if e.label == deprecated {
                e.label = target.to_string();
                n += 1;
            }
        }
        drop(edges);
        let mut types = self.types.write().unwrap();
        if let Some(t) = types.get_mut(deprecated) {
            t.is_active = false;
        }
        Ok(n)
    }

    fn deactivate_type(&self, name: &str) -> StorageResult<()> {
        let has_live_edges = self.count_edges_by_label(name)? > 0;
        let mut types = self.types.write().unwrap();
        let t = types
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        if t.is_builtin {
            return Err(StorageError::Conflict(format!("{name} is builtin")));
        }
        if has_live_edges {
            return Err(StorageError::Conflict(format!("{name} still has live edges")));
        }
        t.is_active = false;
        Ok(())
    }

    fn prune_type(&self, name: &str) -> StorageResult<()> {
        let mut types = self.types.write().unwrap();
        let t = types
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        if t.is_builtin {
            return Err(StorageError::Conflict(format!("{name} is builtin")));
        }
        if t.usage_count > 0 {
            return Err(StorageError::Conflict(format!("{name} still has usage_count > 0")));
        }
        types.remove(name);
        Ok(())
    }

    fn update_type_attributes(&self, name: &str, patch: &AttributePatch) -> StorageResult<()> {
        let mut types = self.types.write().unwrap();
        let t = types
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        if let Some(ref e) = patch.embedding {
            t.embedding = Some(e.clone());
        }
        if let Some(ref m) = patch.embedding_model_id {
            t.embedding_model_id = Some(m.clone());
        }
        if let Some(status) = patch.epistemic_status {
            t.epistemic_status = Some(status);
        }
        if let Some(stats) = patch.epistemic_stats {
            t.epistemic_stats = Some(stats);
        }
        if let Some(ts) = patch.status_measured_at {
            t.status_measured_at = Some(ts);
        }
        if let Some(category) = patch.category {
            t.category = category;
        }
        if let Some(c) = patch.category_confidence {
            t.category_confidence = c;
        }
        if let Some(source) = patch.category_source {
            t.category_source = source;
        }
        t.updated_at = chrono::Utc::now();
        Ok(())
    }

    fn bump_measurement_epoch(&self) -> StorageResult<u64> {
        Ok(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
