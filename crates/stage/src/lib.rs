//! Stage: everything the player sees, driven by interpreter commands.
//!
//! # Invariants
//! - The stage never mutates interpreter state; it only applies drained commands.
//! - Actor placement is derived from commands and restorable from a blob alone.
//! - Presenters are trait objects; swapping one does not change the interpreter.

mod director;
mod layer;
mod roster;
mod typewriter;

pub use director::{Director, Presenter, TranscriptPresenter};
pub use layer::{ActorLayer, StageConfig};
pub use roster::{CharacterProfile, CharacterRoster, RosterError};
pub use typewriter::{MAX_DELAY, Typewriter, delay_for_speed};
