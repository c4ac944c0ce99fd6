//! Shared vocabulary for the novella crates.
//!
//! Everything that crosses a crate boundary lives here: identifiers, the
//! per-actor display state, and the [`Savable`] contract that lets the
//! persistence engine treat every stateful subsystem uniformly.

pub mod savable;
pub mod types;

pub use savable::{RestoreError, RestorePhase, Savable, SavableKind, SharedSavable, StateBlob};
pub use types::{
    ActorDisplayState, PortraitPlacement, PositionSlot, RecordId, ScriptState, SlotId,
    VariablesState,
};
