use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("roster JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One character profile as stored in the roster file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub expressions: Vec<String>,
}

/// Actor id → profile lookup used when presenting lines.
#[derive(Debug, Clone, Default)]
pub struct CharacterRoster {
    profiles: HashMap<String, CharacterProfile>,
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of profiles. Later duplicates of an id are ignored.
    pub fn from_profiles(profiles: impl IntoIterator<Item = CharacterProfile>) -> Self {
        let mut roster = Self::new();
        for profile in profiles {
            if roster.profiles.contains_key(&profile.id) {
                tracing::warn!(id = %profile.id, "duplicate character id, keeping first");
                continue;
            }
            roster.profiles.insert(profile.id.clone(), profile);
        }
        roster
    }

    /// Parse a JSON array of profiles.
    pub fn from_json_str(json: &str) -> Result<Self, RosterError> {
        let profiles: Vec<CharacterProfile> = serde_json::from_str(json)?;
        Ok(Self::from_profiles(profiles))
    }

    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let json = std::fs::read_to_string(path)?;
        let roster = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), characters = roster.len(), "character roster loaded");
        Ok(roster)
    }

    pub fn profile(&self, actor_id: &str) -> Option<&CharacterProfile> {
        self.profiles.get(actor_id)
    }

    /// Display name for `actor_id`, or the id itself when unknown.
    pub fn display_name<'a>(&'a self, actor_id: &'a str) -> &'a str {
        self.profiles
            .get(actor_id)
            .map_or(actor_id, |p| p.display_name.as_str())
    }

    /// Whether the profile lists `expression`. Profiles without a list accept any.
    pub fn has_expression(&self, actor_id: &str, expression: &str) -> bool {
        match self.profiles.get(actor_id) {
            Some(p) if !p.expressions.is_empty() => p.expressions.iter().any(|e| e == expression),
            Some(_) => true,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
