use novella_common::{ActorDisplayState, SavableKind, ScriptState, SlotId, StateBlob, VariablesState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a slot needs to rebuild a playthrough.
///
/// Built fresh from the registered subsystems on every save and never mutated
/// once handed to the writer. Parts no subsystem supplied stay `None`, so a
/// restore only touches what was actually captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveData {
    pub script: Option<ScriptState>,
    pub chapter: String,
    pub actors: Option<Vec<ActorDisplayState>>,
    pub variables: Option<VariablesState>,
    /// Free-form state of custom subsystems, keyed by their blob key.
    pub subsystem_states: BTreeMap<String, String>,
    /// Unix seconds.
    pub timestamp: i64,
    pub play_time_secs: u64,
}

impl ArchiveData {
    /// Fold one captured blob into the archive. A second blob of the same kind replaces the first.
    pub fn absorb(&mut self, blob: StateBlob) {
        let kind = blob.kind();
        let replaced = match blob {
            StateBlob::Script(state) => self.script.replace(state).is_some(),
            StateBlob::Actors(actors) => self.actors.replace(actors).is_some(),
            StateBlob::Variables(vars) => self.variables.replace(vars).is_some(),
            StateBlob::Custom { key, payload } => {
                self.subsystem_states.insert(key, payload).is_some()
            }
        };
        if replaced {
            tracing::warn!(%kind, "two subsystems captured the same kind, keeping the last");
        }
    }

    /// The blob to hand back to a subsystem of `kind`, if one was saved.
    pub fn blob_for(&self, kind: &SavableKind) -> Option<StateBlob> {
        match kind {
            SavableKind::Script => self.script.clone().map(StateBlob::Script),
            SavableKind::Actors => self.actors.clone().map(StateBlob::Actors),
            SavableKind::Variables => self.variables.clone().map(StateBlob::Variables),
            SavableKind::Custom(key) => {
                self.subsystem_states
                    .get(key)
                    .map(|payload| StateBlob::Custom {
                        key: key.clone(),
                        payload: payload.clone(),
                    })
            }
        }
    }
}

/// What a slot picker shows without reading the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSlotMeta {
    pub slot: SlotId,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub save_time: String,
    pub chapter: String,
    /// Screenshot file name inside the screenshot directory.
    pub screenshot: Option<String>,
    pub play_time_secs: u64,
    pub is_empty: bool,
}

impl SaveSlotMeta {
    pub fn empty(slot: SlotId) -> Self {
        Self {
            slot,
            save_time: String::new(),
            chapter: String::new(),
            screenshot: None,
            play_time_secs: 0,
            is_empty: true,
        }
    }

    /// `HH:MM:SS`; hours are not wrapped at 24.
    pub fn formatted_play_time(&self) -> String {
        format_play_time(self.play_time_secs)
    }
}

pub fn format_play_time(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
