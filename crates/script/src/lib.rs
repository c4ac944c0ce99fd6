//! Script interpreter: tabular dialogue scripts executed as a jumping state machine.
//!
//! # Invariants
//! - The jump index is rebuilt wholesale on every load and never patched.
//! - Only the interpreter's own transition function mutates its state.
//! - Auto-advancing opcodes never suspend; a chain of them resolves within one step.
//! - Presentation effects leave the interpreter as [`StageCommand`]s, drained by the host.

pub mod command;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod record;
pub mod source;
pub mod vars;

pub use command::{ChoiceOption, LineView, StageCommand, parse_choices};
pub use error::ScriptError;
pub use interpreter::{Interpreter, InterpreterConfig, RunState};
pub use parser::{parse, parse_row, split_cells};
pub use record::{Opcode, Position, ScriptRecord};
pub use source::{DirSource, MemorySource, ScriptSource};
pub use vars::StoryVariables;
