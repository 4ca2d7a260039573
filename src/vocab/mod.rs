//! Vocabulary data model: the governed types, category seeds, and the
//! aggressiveness profile curve.

mod profile;
mod types;

pub use profile::{aggressiveness, AggressivenessProfile, Zone};
pub use types::{
    AttributePatch, Category, CategorySeed, CategorySource, EpistemicStats, EpistemicStatus,
    GraphEdge, SqlValue, TypeName, VocabularyFilter, VocabularyType,
};
