//! The capture/restore contract shared by every stateful subsystem.
//!
//! # Invariants
//! - `capture` is a pure read.
//! - A blob carries its own [`SavableKind`] tag, so the persistence engine can
//!   fold and route blobs without knowing the concrete subsystem types.
//! - `restore` with a blob of the wrong kind returns [`RestoreError::TypeMismatch`]
//!   and leaves the subsystem untouched.

use crate::types::{ActorDisplayState, ScriptState, VariablesState};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A savable subsystem shared between its owner and the persistence engine.
///
/// All state lives on one logical thread, so shared ownership is `Rc<RefCell<_>>`.
pub type SharedSavable = Rc<RefCell<dyn Savable>>;

/// Identifies which subsystem produced (or accepts) a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SavableKind {
    Script,
    Actors,
    Variables,
    Custom(String),
}

/// Restore ordering. Phases run in ascending order; the interpreter goes last
/// because re-rendering its current line depends on actors already being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestorePhase {
    Visual,
    Data,
    Script,
}

impl RestorePhase {
    pub const ORDER: [RestorePhase; 3] = [Self::Visual, Self::Data, Self::Script];
}

impl SavableKind {
    pub fn phase(&self) -> RestorePhase {
        match self {
            Self::Actors => RestorePhase::Visual,
            Self::Variables | Self::Custom(_) => RestorePhase::Data,
            Self::Script => RestorePhase::Script,
        }
    }
}

impl fmt::Display for SavableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => f.write_str("script"),
            Self::Actors => f.write_str("actors"),
            Self::Variables => f.write_str("variables"),
            Self::Custom(key) => write!(f, "custom:{key}"),
        }
    }
}

/// A self-describing snapshot of one subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateBlob {
    Script(ScriptState),
    Actors(Vec<ActorDisplayState>),
    Variables(VariablesState),
    /// Free-form state of any other subsystem, stored under `key`.
    Custom { key: String, payload: String },
}

impl StateBlob {
    pub fn kind(&self) -> SavableKind {
        match self {
            Self::Script(_) => SavableKind::Script,
            Self::Actors(_) => SavableKind::Actors,
            Self::Variables(_) => SavableKind::Variables,
            Self::Custom { key, .. } => SavableKind::Custom(key.clone()),
        }
    }
}

/// Errors from [`Savable::restore`].
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("restore type mismatch: expected {expected} blob, got {found}")]
    TypeMismatch {
        expected: SavableKind,
        found: SavableKind,
    },
    #[error("invalid {kind} state: {reason}")]
    Invalid { kind: SavableKind, reason: String },
}

impl RestoreError {
    /// Shorthand for the mismatch returned when `blob` is not of kind `expected`.
    pub fn mismatch(expected: SavableKind, blob: &StateBlob) -> Self {
        Self::TypeMismatch {
            expected,
            found: blob.kind(),
        }
    }
}

/// A subsystem whose state survives a save/restore cycle.
pub trait Savable {
    /// The kind of blob this subsystem produces and accepts.
    fn kind(&self) -> SavableKind;

    /// Snapshot the current state. Must not mutate.
    fn capture(&self) -> StateBlob;

    /// Rebuild observable state from `blob`, re-deriving any index-like data.
    fn restore(&mut self, blob: StateBlob) -> Result<(), RestoreError>;
}
