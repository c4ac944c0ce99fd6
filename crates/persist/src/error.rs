use novella_common::SlotId;
use std::path::PathBuf;

/// Errors from slot and global-data persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("slot {0} is empty")]
    SlotEmpty(SlotId),
    #[error("slot {0} is not a configured slot")]
    UnknownSlot(SlotId),
    #[error("corrupt save {path}: {reason}")]
    CorruptSave { path: PathBuf, reason: String },
    #[error("failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a save is already in progress")]
    SaveInFlight,
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("CBOR serialization error: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersistError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptSave {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
