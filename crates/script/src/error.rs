use novella_common::RecordId;

/// Errors raised while parsing or interpreting a script.
///
/// None of these abort a running script: rows are dropped, jumps halt in place,
/// and the host decides what to do next.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("jump target {0} not found in the loaded script")]
    JumpTargetMissing(RecordId),
    #[error("jump target '{0}' is not a record id")]
    InvalidJumpTarget(String),
    #[error("script not found: {0}")]
    ScriptNotFound(String),
    #[error("auto-advance chain exceeded {0} steps without blocking")]
    RunawayChain(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
