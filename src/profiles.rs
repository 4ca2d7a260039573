//! Aggressiveness profile CRUD.
//!
//! Profiles are read any / create or delete non-builtin (spec §6); builtin
//! profiles can never be altered or deleted. Persistence mirrors
//! `ConfigStore` (`config.rs`): a small trait the engine depends on, backed
//! by whatever table the graph store happens to keep it in.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::vocab::AggressivenessProfile;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("builtin profiles cannot be altered or deleted: {0}")]
    Builtin(String),

    #[error("a profile named {0} already exists")]
    AlreadyExists(String),
}

pub type ProfileResult<T> = Result<T, ProfileError>;

pub trait ProfileStore: Send + Sync {
    fn list(&self) -> Vec<AggressivenessProfile>;
    fn get(&self, name: &str) -> Option<AggressivenessProfile>;
    fn create(&self, profile: AggressivenessProfile) -> ProfileResult<()>;
    fn delete(&self, name: &str) -> ProfileResult<()>;
}

/// The profiles every fresh vocabulary ships with. `balanced` is the
/// default named in `VocabConfig::aggressiveness_profile`.
fn seed_builtins() -> Vec<AggressivenessProfile> {
    vec![
        AggressivenessProfile::balanced(),
        // Ramps aggressiveness early and holds near the ceiling, for
        // vocabularies under sustained ingestion pressure.
        AggressivenessProfile::builtin("aggressive", 0.1, 0.6, 0.4, 1.8),
        // Stays gentle until deep into the emergency zone.
        AggressivenessProfile::builtin("cautious", 0.6, -0.3, 0.9, 0.4),
    ]
}

pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, AggressivenessProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        let mut profiles = HashMap::new();
        for p in seed_builtins() {
            profiles.insert(p.name.clone(), p);
        }
        Self { profiles: RwLock::new(profiles) }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn list(&self) -> Vec<AggressivenessProfile> {
        let mut out: Vec<AggressivenessProfile> = self.profiles.read().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn get(&self, name: &str) -> Option<AggressivenessProfile> {
        self.profiles.read().unwrap().get(name).cloned()
    }

    fn create(&self, profile: AggressivenessProfile) -> ProfileResult<()> {
        let mut profiles = self.profiles.write().unwrap();
        if profiles.contains_key(&profile.name) {
            return Err(ProfileError::AlreadyExists(profile.name));
        }
        profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    fn delete(&self, name: &str) -> ProfileResult<()> {
        let mut profiles = self.profiles.write().unwrap();
        match profiles.get(name) {
            None => Err(ProfileError::NotFound(name.to_string())),
            Some(p) if p.is_builtin => Err(ProfileError::Builtin(name.to_string())),
            Some(_) => {
                profiles.remove(name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_are_seeded_and_listed() {
        let store = InMemoryProfileStore::new();
        let names: Vec<String> = store.list().into_iter().map(|p| p.name).collect();
        assert!(names.contains(&"balanced".to_string()));
    }

    #[test]
    fn builtin_profile_cannot_be_deleted() {
        let store = InMemoryProfileStore::new();
        assert!(matches!(store.delete("balanced"), Err(ProfileError::Builtin(_))));
    }

    #[test]
    fn custom_profile_can_be_created_and_deleted() {
        let store = InMemoryProfileStore::new();
        store.create(AggressivenessProfile::new("gentle", 0.2, 0.0, 0.8, 0.5)).unwrap();
        assert!(store.get("gentle").is_some());
        store.delete("gentle").unwrap();
        assert!(store.get("gentle").is_none());
    }

    #[test]
    fn creating_a_duplicate_name_is_rejected() {
        let store = InMemoryProfileStore::new();
        assert!(matches!(store.create(AggressivenessProfile::balanced()), Err(ProfileError::AlreadyExists(_))));
    }
}
