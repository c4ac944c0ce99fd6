use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a script record. Unique within a script, used as the jump target.
pub type RecordId = i64;

/// A persistence bucket: one of the numbered manual slots or the reserved automatic slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotId {
    Manual(u32),
    Auto,
}

impl SlotId {
    /// File stem shared by the slot's save file and screenshot.
    pub fn file_stem(&self) -> String {
        match self {
            Self::Manual(n) => format!("save_{n}"),
            Self::Auto => "auto_save".to_string(),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual(n) => write!(f, "{n}"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for SlotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse::<u32>()
            .map(Self::Manual)
            .map_err(|_| format!("invalid slot id '{s}': expected a number or 'auto'"))
    }
}

/// Where an actor sits on stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSlot {
    Slot(u8),
    Hidden,
}

/// Placement requested by a dialogue line for its speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortraitPlacement {
    /// Leave an on-stage actor where it is (new actors go to the default slot).
    KeepCurrent,
    Slot(usize),
}

/// Display state of one on-stage actor, enough to rebuild the stage without
/// replaying the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDisplayState {
    pub actor_id: String,
    pub position: PositionSlot,
    pub expression: String,
    pub visible: bool,
    /// Draw-order rank; higher draws on top.
    pub draw_order: u32,
    #[serde(default)]
    pub focused: bool,
}

/// Interpreter position plus the presentation it last applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptState {
    pub script_name: String,
    pub program_counter: usize,
    pub awaiting_choice: bool,
    pub background: Option<String>,
    pub music: Option<String>,
    pub music_volume: f32,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            script_name: String::new(),
            program_counter: 0,
            awaiting_choice: false,
            background: None,
            music: None,
            music_volume: 1.0,
        }
    }
}

/// Flat story variables of the current playthrough.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariablesState {
    pub ints: BTreeMap<String, i64>,
    pub strings: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_id_parses_numbers_and_auto() {
        assert_eq!("2".parse::<SlotId>().unwrap(), SlotId::Manual(2));
        assert_eq!("AUTO".parse::<SlotId>().unwrap(), SlotId::Auto);
        assert!("-1".parse::<SlotId>().is_err());
        assert!("left".parse::<SlotId>().is_err());
    }

    #[test]
    fn slot_file_stems_are_deterministic() {
        assert_eq!(SlotId::Manual(0).file_stem(), "save_0");
        assert_eq!(SlotId::Auto.file_stem(), "auto_save");
    }

    #[test]
    fn actor_state_defaults_focus_when_missing() {
        let json = r#"{"actor_id":"hero","position":{"Slot":1},"expression":"smile","visible":true,"draw_order":0}"#;
        let state: ActorDisplayState = serde_json::from_str(json).unwrap();
        assert!(!state.focused);
        assert_eq!(state.position, PositionSlot::Slot(1));
    }
}
