use novella_common::{PortraitPlacement, RecordId};

/// A dialogue line ready for the text collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineView {
    pub record_id: RecordId,
    /// Empty for narration.
    pub actor_id: String,
    pub expression: String,
    pub text: String,
    pub speed: Option<String>,
}

/// One selectable branch of a `CHOOSE` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: String,
    pub target: RecordId,
}

/// A presentation effect requested by the interpreter.
///
/// The interpreter never calls collaborators directly; it queues commands and the
/// host drains and applies them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum StageCommand {
    ShowLine(LineView),
    ShowChoices(Vec<ChoiceOption>),
    UpdatePortrait {
        actor_id: String,
        expression: String,
        placement: PortraitPlacement,
    },
    HideActor(String),
    HideAll,
    SetFocus { actor_id: String, focused: bool },
    SetBackground(String),
    SetMusic(String),
}

/// Parse a `CHOOSE` payload of the form `label:target|label:target`.
///
/// Entries without a `:` or with a non-integer target are skipped. The label is
/// everything before the last `:`.
pub fn parse_choices(payload: &str) -> Vec<ChoiceOption> {
    payload
        .split('|')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let Some((label, target)) = entry.rsplit_once(':') else {
                tracing::warn!(entry, "choice option has no target");
                return None;
            };
            match target.trim().parse() {
                Ok(target) => Some(ChoiceOption {
                    label: label.trim().to_string(),
                    target,
                }),
                Err(_) => {
                    tracing::warn!(entry, "choice target is not a record id");
                    None
                }
            }
        })
        .collect()
}
