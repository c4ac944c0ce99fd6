use crate::error::PersistError;
use crate::store::write_atomic;
use novella_common::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Progress shared by every playthrough, stored outside the slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalData {
    pub unlocked_endings: BTreeSet<String>,
    pub read_records: BTreeSet<RecordId>,
    pub flags: BTreeMap<String, bool>,
    pub unlocked_gallery: BTreeSet<String>,
}

impl GlobalData {
    /// Load from `path`, creating the file with defaults if it does not exist.
    ///
    /// An unreadable file is logged and replaced in memory by defaults; it is
    /// only overwritten on the next explicit save.
    pub fn load_or_create(path: &Path) -> Result<Self, PersistError> {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(data) => {
                    tracing::debug!(path = %path.display(), "global data loaded");
                    Ok(data)
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "global data unreadable, using defaults");
                    Ok(Self::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let data = Self::default();
                data.save(path)?;
                tracing::info!(path = %path.display(), "global data created");
                Ok(data)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    /// Returns true the first time a record is marked.
    pub fn mark_read(&mut self, id: RecordId) -> bool {
        self.read_records.insert(id)
    }

    pub fn is_read(&self, id: RecordId) -> bool {
        self.read_records.contains(&id)
    }

    pub fn unlock_ending(&mut self, ending: impl Into<String>) -> bool {
        self.unlocked_endings.insert(ending.into())
    }

    pub fn unlock_gallery(&mut self, item: impl Into<String>) -> bool {
        self.unlocked_gallery.insert(item.into())
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.flags.insert(key.into(), value);
    }

    /// Unset flags read as false.
    pub fn flag(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_when_absent_and_reloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("global_data.json");
        let mut data = GlobalData::load_or_create(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(data, GlobalData::default());

        assert!(data.mark_read(10));
        assert!(!data.mark_read(10));
        data.unlock_ending("true_end");
        data.set_flag("seen_intro", true);
        data.save(&path).unwrap();

        let reloaded = GlobalData::load_or_create(&path).unwrap();
        assert!(reloaded.is_read(10));
        assert!(reloaded.unlocked_endings.contains("true_end"));
        assert!(reloaded.flag("seen_intro"));
        assert!(!reloaded.flag("missing"));
    }

    #[test]
    fn unreadable_file_is_not_overwritten_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("global_data.json");
        std::fs::write(&path, "not json").unwrap();
        let data = GlobalData::load_or_create(&path).unwrap();
        assert_eq!(data, GlobalData::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }
}
