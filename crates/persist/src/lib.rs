//! Persistence: Savable registry, crash-safe save slots, global data, and
//! idle-gated auto-save.
//!
//! # Invariants
//! - A committed slot file is only ever replaced by an atomic rename.
//! - A load restores nothing unless the whole slot decodes and verifies.
//! - Restore order is actors, then data subsystems, then the interpreter.
//! - At most one save is in flight; loads are refused while it runs.

pub mod archive;
pub mod autosave;
pub mod config;
pub mod engine;
pub mod error;
pub mod global;
pub mod store;

pub use archive::{ArchiveData, SaveSlotMeta, format_play_time};
pub use autosave::{AutoSaveOutcome, AutoSavePolicy, AutoSaveTrigger, GameState};
pub use config::PersistConfig;
pub use engine::{LoadReport, PersistEvent, QUICK_SAVE_LABEL, SaveEngine};
pub use error::PersistError;
pub use global::GlobalData;
pub use store::{SLOT_SCHEMA_VERSION, SlotHeader, SlotStore};
