use crate::error::PersistError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where saves live and how auto-save behaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub save_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    /// Manual slots are numbered `0..manual_slot_count`.
    pub manual_slot_count: u32,
    pub auto_save_enabled: bool,
    /// Idle time between interval auto-saves, in seconds.
    pub auto_save_interval_secs: u64,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self::under(".")
    }
}

impl PersistConfig {
    /// Default settings with `saves/` and `screenshots/` under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            save_dir: root.join("saves"),
            screenshot_dir: root.join("screenshots"),
            manual_slot_count: 3,
            auto_save_enabled: true,
            auto_save_interval_secs: 600,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PersistError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs)
    }
}
