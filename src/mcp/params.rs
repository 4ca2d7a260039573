//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConsolidateParams {
    #[schemars(description = "Target vocabulary size; must fall within [vocab_min, vocab_max]")]
    pub target_size: u64,
    #[schemars(description = "If true, decide every candidate but never mutate the graph")]
    pub dry_run: Option<bool>,
    #[schemars(description = "If true (default), sweep zero-usage non-builtin types after the main loop")]
    pub prune_unused: Option<bool>,
    #[schemars(description = "Seed for reproducible edge sampling")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MeasureEpistemicParams {
    #[schemars(description = "Max edges sampled per type (default 50)")]
    pub sample_size: Option<usize>,
    #[schemars(description = "Seed for reproducible edge sampling")]
    pub seed: Option<u64>,
    #[schemars(description = "If true (default), persist status/stats via the graph adapter")]
    pub store: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListVocabularyParams {
    #[schemars(description = "Include deactivated (merged-away) types")]
    pub include_inactive: Option<bool>,
    #[schemars(description = "Include builtin types")]
    pub include_builtin: Option<bool>,
    #[schemars(description = "Only include types with a cached embedding")]
    pub only_with_embeddings: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProfileParams {
    #[schemars(description = "Unique profile name")]
    pub name: String,
    #[schemars(description = "First control point x, in [0,1]")]
    pub x1: f64,
    #[schemars(description = "First control point y, in [-2,2]")]
    pub y1: f64,
    #[schemars(description = "Second control point x, in [0,1]")]
    pub x2: f64,
    #[schemars(description = "Second control point y, in [-2,2]")]
    pub y2: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProfileNameParams {
    #[schemars(description = "Name of the profile")]
    pub name: String,
}
