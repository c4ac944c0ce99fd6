use novella_common::RecordId;
use serde::{Deserialize, Serialize};

/// The command type of a script record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Dialog,
    Load,
    Jump,
    Choose,
    SetBackground,
    SetMusic,
    Focus,
    Hide,
}

impl Opcode {
    pub const ALL: [Opcode; 8] = [
        Self::Dialog,
        Self::Load,
        Self::Jump,
        Self::Choose,
        Self::SetBackground,
        Self::SetMusic,
        Self::Focus,
        Self::Hide,
    ];

    /// Match an opcode token case-insensitively. Accepts the canonical names and
    /// the legacy `CMD_*` spellings.
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        let op = match upper.as_str() {
            "DIALOG" => Self::Dialog,
            "LOAD" | "CMD_LOAD" => Self::Load,
            "JUMP" | "CMD_JUMP" => Self::Jump,
            "CHOOSE" | "CMD_CHOOSE" => Self::Choose,
            "SET_BACKGROUND" | "CMD_BG" => Self::SetBackground,
            "SET_MUSIC" | "CMD_BGM" => Self::SetMusic,
            "FOCUS" | "CMD_FOCUS" => Self::Focus,
            "HIDE" | "CMD_HIDE" => Self::Hide,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical token, as written in scripts.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Dialog => "DIALOG",
            Self::Load => "LOAD",
            Self::Jump => "JUMP",
            Self::Choose => "CHOOSE",
            Self::SetBackground => "SET_BACKGROUND",
            Self::SetMusic => "SET_MUSIC",
            Self::Focus => "FOCUS",
            Self::Hide => "HIDE",
        }
    }

    /// Whether the interpreter suspends on this opcode waiting for the host.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Dialog | Self::Choose)
    }
}

/// The position column of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Empty cell: keep the actor where it is.
    Keep,
    Slot(usize),
    /// The literal `HIDE`: remove the speaker from the stage.
    Hide,
    /// Anything else; kept for diagnostics and treated as [`Position::Keep`].
    Named(String),
}

impl Position {
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            Self::Keep
        } else if cell.eq_ignore_ascii_case("HIDE") {
            Self::Hide
        } else if let Ok(slot) = cell.parse::<usize>() {
            Self::Slot(slot)
        } else {
            Self::Named(cell.to_string())
        }
    }
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: RecordId,
    pub opcode: Opcode,
    /// Empty for narration.
    pub actor_id: String,
    pub expression: String,
    pub position: Position,
    pub speed: Option<String>,
    pub payload: String,
}

impl ScriptRecord {
    pub fn is_narration(&self) -> bool {
        self.actor_id.is_empty()
    }
}
