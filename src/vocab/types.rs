//! Core data model for the governed vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identity of a vocabulary type: a case-stable textual name, unique in
/// the vocabulary (e.g. `IMPLIES`).
///
/// Serializes as a plain string, a transparent newtype around the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed category set a vocabulary type can be assigned to.
///
/// Closed by design: new categories require a code change and a
/// category-seed refresh, not a runtime registration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Composition,
    Causation,
    Logical,
    Temporal,
    Spatial,
    Identity,
    Other,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Composition,
            Category::Causation,
            Category::Logical,
            Category::Temporal,
            Category::Spatial,
            Category::Identity,
            Category::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Composition => "composition",
            Category::Causation => "causation",
            Category::Logical => "logical",
            Category::Temporal => "temporal",
            Category::Spatial => "spatial",
            Category::Identity => "identity",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "composition" => Ok(Category::Composition),
            "causation" => Ok(Category::Causation),
            "logical" => Ok(Category::Logical),
            "temporal" => Ok(Category::Temporal),
            "spatial" => Ok(Category::Spatial),
            "identity" => Ok(Category::Identity),
            "other" => Ok(Category::Other),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a type's category assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySource {
    Builtin,
    Computed,
    Manual,
}

/// The seven epistemic states a type's grounding distribution can be
/// classified into, in the priority order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpistemicStatus {
    InsufficientData,
    Contradicted,
    PoorlyGrounded,
    WeakGrounding,
    MixedGrounding,
    WellGrounded,
    Historical,
}

impl fmt::Display for EpistemicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EpistemicStatus::InsufficientData => "INSUFFICIENT_DATA",
            EpistemicStatus::Contradicted => "CONTRADICTED",
            EpistemicStatus::PoorlyGrounded => "POORLY_GROUNDED",
            EpistemicStatus::WeakGrounding => "WEAK_GROUNDING",
            EpistemicStatus::MixedGrounding => "MIXED_GROUNDING",
            EpistemicStatus::WellGrounded => "WELL_GROUNDED",
            EpistemicStatus::Historical => "HISTORICAL",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate grounding statistics sampled for a type by the Epistemic
/// Classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpistemicStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl EpistemicStats {
    pub fn empty() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            count: 0,
        }
    }

    /// Compute stats from a slice of per-edge grounding values in [-1, 1].
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::empty();
        }
        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let std = variance.sqrt();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self { mean, std, min, max, count }
    }
}

/// The governed object: a relationship-type name used as an edge label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyType {
    pub name: TypeName,
    pub category: Category,
    pub category_confidence: f64,
    pub category_source: CategorySource,
    pub is_builtin: bool,
    pub is_active: bool,
    pub usage_count: u64,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model_id: Option<String>,
    pub epistemic_status: Option<EpistemicStatus>,
    pub epistemic_stats: Option<EpistemicStats>,
    pub status_measured_at: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VocabularyType {
    /// Construct a freshly-created custom (non-builtin) type. Always active
    /// at creation.
    pub fn new_custom(name: impl Into<String>, category: Category) -> Self {
        let now = Utc::now();
        Self {
            name: TypeName::new(name),
            category,
            category_confidence: 0.0,
            category_source: CategorySource::Computed,
            is_builtin: false,
            is_active: true,
            usage_count: 0,
            embedding: None,
            embedding_model_id: None,
            epistemic_status: None,
            epistemic_stats: None,
            status_measured_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Construct a pinned builtin type: builtin implies active, always, with
    /// no code path able to deactivate it.
    pub fn new_builtin(name: impl Into<String>, category: Category) -> Self {
        let mut t = Self::new_custom(name, category);
        t.is_builtin = true;
        t.category_source = CategorySource::Builtin;
        t.category_confidence = 1.0;
        t
    }

    /// Eligible for automatic pruning: zero usage and not builtin.
    pub fn is_auto_prune_eligible(&self) -> bool {
        !self.is_builtin && self.usage_count == 0
    }
}

/// The semantic anchor for a category. Read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: Category,
    pub seed_text: Vec<String>,
    pub seed_embedding: Vec<f32>,
}

/// A sampled or counted edge, as read by the engine through the Graph
/// Adapter. The engine never reads more of an edge than this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub confidence: f32,
}

/// Filter criteria for `GraphAdapter::list_vocabulary`.
#[derive(Debug, Clone, Default)]
pub struct VocabularyFilter {
    pub include_inactive: bool,
    pub include_builtin: bool,
    pub only_with_embeddings: bool,
}

/// A structured attribute patch for `update_type_attributes`.
///
/// Travels as a typed variant end-to-end so a storage backend can emit the
/// native map/list literal form instead of quoting a structured value as a
/// JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Map(HashMap<String, SqlValue>),
    List(Vec<SqlValue>),
}

/// Patch applied by `update_type_attributes`. Each field is optional;
/// absent fields are left unchanged. Last-writer-wins per type.
#[derive(Debug, Clone, Default)]
pub struct AttributePatch {
    pub embedding: Option<Vec<f32>>,
    pub embedding_model_id: Option<String>,
    pub epistemic_status: Option<EpistemicStatus>,
    pub epistemic_stats: Option<EpistemicStats>,
    pub status_measured_at: Option<u64>,
    pub category: Option<Category>,
    pub category_confidence: Option<f64>,
    pub category_source: Option<CategorySource>,
}

impl AttributePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>, model_id: impl Into<String>) -> Self {
        self.embedding = Some(embedding);
        self.embedding_model_id = Some(model_id.into());
        self
    }

    pub fn with_epistemic(mut self, status: EpistemicStatus, stats: EpistemicStats, measured_at: u64) -> Self {
        self.epistemic_status = Some(status);
        self.epistemic_stats = Some(stats);
        self.status_measured_at = Some(measured_at);
        self
    }

    pub fn with_category(mut self, category: Category, confidence: f64, source: CategorySource) -> Self {
        self.category = Some(category);
        self.category_confidence = Some(confidence);
        self.category_source = Some(source);
        self
    }

    /// Encode this patch as a structured `SqlValue::Map`, the shape a
    /// storage backend should bind as a native map parameter.
    pub fn as_map(&self) -> SqlValue {
        let mut map = HashMap::new();
        if let Some(ref e) = self.embedding {
            map.insert(
                "embedding".to_string(),
                SqlValue::List(e.iter().map(|v| SqlValue::Float(*v as f64)).collect()),
            );
        }
        if let Some(ref m) = self.embedding_model_id {
            map.insert("embedding_model_id".to_string(), SqlValue::Text(m.clone()));
        }
        if let Some(status) = self.epistemic_status {
            map.insert("epistemic_status".to_string(), SqlValue::Text(status.to_string()));
        }
        if let Some(stats) = self.epistemic_stats {
            let mut s = HashMap::new();
            s.insert("mean".to_string(), SqlValue::Float(stats.mean));
            s.insert("std".to_string(), SqlValue::Float(stats.std));
            s.insert("min".to_string(), SqlValue::Float(stats.min));
            s.insert("max".to_string(), SqlValue::Float(stats.max));
            s.insert("count".to_string(), SqlValue::Int(stats.count as i64));
            map.insert("epistemic_stats".to_string(), SqlValue::Map(s));
        }
        if let Some(ts) = self.status_measured_at {
            map.insert("status_measured_at".to_string(), SqlValue::Int(ts as i64));
        }
        if let Some(category) = self.category {
            map.insert("category".to_string(), SqlValue::Text(category.to_string()));
        }
        if let Some(c) = self.category_confidence {
            map.insert("category_confidence".to_string(), SqlValue::Float(c));
        }
        if let Some(source) = self.category_source {
            let s = match source {
                CategorySource::Builtin => "builtin",
                CategorySource::Computed => "computed",
                CategorySource::Manual => "manual",
            };
            map.insert("category_source".to_string(), SqlValue::Text(s.to_string()));
        }
        SqlValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_type_is_always_active() {
        let t = VocabularyType::new_builtin("IMPLIES", Category::Logical);
        assert!(t.is_builtin);
        assert!(t.is_active);
    }

    #[test]
    fn custom_type_starts_active_with_zero_usage() {
        let t = VocabularyType::new_custom("ENTAILS", Category::Logical);
        assert!(!t.is_builtin);
        assert!(t.is_active);
        assert_eq!(t.usage_count, 0);
        assert!(t.is_auto_prune_eligible());
    }

    #[test]
    fn builtin_type_never_auto_prune_eligible() {
        let t = VocabularyType::new_builtin("IMPLIES", Category::Logical);
        assert!(!t.is_auto_prune_eligible());
    }

    #[test]
    fn epistemic_stats_from_samples_computes_moments() {
        let stats = EpistemicStats::from_samples(&[0.5, 0.5, 0.5]);
        assert!((stats.mean - 0.5).abs() < 1e-9);
        assert!((stats.std).abs() < 1e-9);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn epistemic_stats_empty_for_no_samples() {
        let stats = EpistemicStats::from_samples(&[]);
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn attribute_patch_encodes_structured_map_not_a_string() {
        let patch = AttributePatch::new().with_category(Category::Causation, 0.9, CategorySource::Computed);
        match patch.as_map() {
            SqlValue::Map(m) => {
                assert!(matches!(m.get("category"), Some(SqlValue::Text(_))));
                assert!(matches!(m.get("category_confidence"), Some(SqlValue::Float(_))));
            }
            _ => panic!("expected a structured map, not a quoted string"),
        }
    }

    #[test]
    fn category_round_trips_through_str() {
        for cat in Category::all() {
            let parsed: Category = cat.as_str().parse().unwrap();
            assert_eq!(parsed, *cat);
        }
    }
}
