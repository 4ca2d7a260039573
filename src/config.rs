//! Configuration surface
//!
//! Configuration is persistent (a key/value table in the graph store),
//! mutated outside this engine. `VocabConfig` is the typed snapshot the
//! engine reads once per invocation, treating config as an immutable read
//! at the start of an operation, never a global mutable.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// `pruning_mode` recognized values: pure math, human review, AI
/// review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningMode {
    Naive,
    Hitl,
    Aitl,
}

/// The full recognized configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabConfig {
    pub vocab_min: u64,
    pub vocab_max: u64,
    pub vocab_emergency: u64,
    pub aggressiveness_profile: String,
    pub similarity_strong: f32,
    pub similarity_moderate: f32,
    pub low_value_threshold: f32,
    pub merge_auto_threshold: f32,
    pub embedding_model: String,
    pub pruning_mode: PruningMode,
    pub auto_expand_enabled: bool,
    /// Max edges sampled per type by the Epistemic Classifier.
    pub epistemic_sample_size: usize,
    /// Recursion depth limit for grounding computation.
    pub grounding_depth_limit: usize,
    /// Regex pattern identifying historically-named predicates.
    pub historical_predicate_pattern: String,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            vocab_min: 30,
            vocab_max: 60,
            vocab_emergency: 90,
            aggressiveness_profile: "balanced".to_string(),
            similarity_strong: 0.90,
            similarity_moderate: 0.70,
            low_value_threshold: 0.2,
            merge_auto_threshold: 0.90,
            embedding_model: "default".to_string(),
            pruning_mode: PruningMode::Naive,
            auto_expand_enabled: true,
            epistemic_sample_size: 50,
            grounding_depth_limit: 2,
            historical_predicate_pattern: r"(?i)^HISTORICALLY_".to_string(),
        }
    }
}

impl VocabConfig {
    /// Validate the configuration, refusing before any side effect occurs
    ///.
    pub fn validate(&self) -> EngineResult<()> {
        if self.vocab_min > self.vocab_max {
            return Err(EngineError::InvalidConfig(format!(
                "vocab_min ({}) must be <= vocab_max ({})",
                self.vocab_min, self.vocab_max
            )));
        }
        if self.vocab_max > self.vocab_emergency {
            return Err(EngineError::InvalidConfig(format!(
                "vocab_max ({}) must be <= vocab_emergency ({})",
                self.vocab_max, self.vocab_emergency
            )));
        }
        for (name, v) in [
            ("similarity_strong", self.similarity_strong),
            ("similarity_moderate", self.similarity_moderate),
            ("low_value_threshold", self.low_value_threshold),
            ("merge_auto_threshold", self.merge_auto_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be in [0,1], got {v}"
                )));
            }
        }
        if self.similarity_moderate > self.similarity_strong {
            return Err(EngineError::InvalidConfig(
                "similarity_moderate must be <= similarity_strong".to_string(),
            ));
        }
        if regex::Regex::new(&self.historical_predicate_pattern).is_err() {
            return Err(EngineError::InvalidConfig(
                "historical_predicate_pattern is not a valid regex".to_string(),
            ));
        }
        Ok(())
    }

    /// Check that `target_size` falls within `[vocab_min, vocab_max]`
    ///.
    pub fn validate_target(&self, target_size: u64) -> EngineResult<()> {
        if target_size < self.vocab_min || target_size > self.vocab_max {
            return Err(EngineError::InvalidConfig(format!(
                "target_size {target_size} out of range [{}, {}]",
                self.vocab_min, self.vocab_max
            )));
        }
        Ok(())
    }
}

/// Read-through access to the persisted key/value configuration table.
///
/// A concrete implementation lives alongside the Graph Adapter (the
/// config table shares the same store), but the engine depends only on
/// this trait so tests can swap in an in-memory map.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> EngineResult<VocabConfig>;
}

/// An in-memory config store, useful for tests and as a default when no
/// persisted configuration exists yet.
pub struct StaticConfigStore(pub VocabConfig);

impl ConfigStore for StaticConfigStore {
    fn load(&self) -> EngineResult<VocabConfig> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(VocabConfig::default().validate().is_ok());
    }

    #[test]
    fn vocab_min_greater_than_max_is_invalid() {
        let mut c = VocabConfig::default();
        c.vocab_min = 100;
        c.vocab_max = 50;
        assert!(matches!(c.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn out_of_range_threshold_is_invalid() {
        let mut c = VocabConfig::default();
        c.similarity_strong = 1.5;
        assert!(matches!(c.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn moderate_above_strong_is_invalid() {
        let mut c = VocabConfig::default();
        c.similarity_moderate = 0.95;
        c.similarity_strong = 0.90;
        assert!(matches!(c.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn target_outside_min_max_is_rejected() {
        let c = VocabConfig::default();
        assert!(c.validate_target(c.vocab_max + 1).is_err());
        assert!(c.validate_target(c.vocab_min).is_ok());
    }
}
