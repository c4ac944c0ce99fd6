use crate::layer::ActorLayer;
use crate::roster::CharacterRoster;
use novella_common::RecordId;
use novella_script::{ChoiceOption, LineView, StageCommand};

/// Output surface for dialogue. All presenters implement this trait.
///
/// A presenter only displays; actor placement lives in [`ActorLayer`] and is
/// handed over after every change.
pub trait Presenter {
    /// Show a dialogue line. `speaker` is the display name, `None` for narration.
    fn show_line(&mut self, speaker: Option<&str>, line: &LineView);

    fn show_choices(&mut self, options: &[ChoiceOption]);

    fn set_background(&mut self, name: &str);

    /// `STOP` stops playback.
    fn set_music(&mut self, name: &str);

    /// Called after portraits moved, changed, or were hidden.
    fn stage_changed(&mut self, _layer: &ActorLayer) {}
}

/// Applies drained interpreter commands to the actor layer and a presenter.
#[derive(Debug, Clone, Default)]
pub struct Director {
    roster: CharacterRoster,
}

impl Director {
    pub fn new(roster: CharacterRoster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &CharacterRoster {
        &self.roster
    }

    /// Apply `commands` in order. Returns the ids of the lines shown.
    pub fn dispatch(
        &self,
        commands: Vec<StageCommand>,
        layer: &mut ActorLayer,
        presenter: &mut dyn Presenter,
    ) -> Vec<RecordId> {
        let mut shown = Vec::new();
        let mut stage_dirty = false;

        for command in commands {
            match command {
                StageCommand::ShowLine(line) => {
                    if stage_dirty {
                        presenter.stage_changed(layer);
                        stage_dirty = false;
                    }
                    let speaker = (!line.actor_id.is_empty())
                        .then(|| self.roster.display_name(&line.actor_id));
                    presenter.show_line(speaker, &line);
                    shown.push(line.record_id);
                }
                StageCommand::ShowChoices(options) => {
                    if stage_dirty {
                        presenter.stage_changed(layer);
                        stage_dirty = false;
                    }
                    presenter.show_choices(&options);
                }
                StageCommand::UpdatePortrait {
                    actor_id,
                    expression,
                    placement,
                } => {
                    if !expression.is_empty() && !self.roster.has_expression(&actor_id, &expression) {
                        tracing::debug!(actor_id = %actor_id, expression = %expression, "expression not in roster");
                    }
                    layer.update_portrait(&actor_id, &expression, placement);
                    stage_dirty = true;
                }
                StageCommand::HideActor(actor_id) => {
                    stage_dirty |= layer.hide_actor(&actor_id);
                }
                StageCommand::HideAll => {
                    layer.hide_all();
                    stage_dirty = true;
                }
                StageCommand::SetFocus { actor_id, focused } => {
                    stage_dirty |= layer.set_focus(&actor_id, focused);
                }
                StageCommand::SetBackground(name) => presenter.set_background(&name),
                StageCommand::SetMusic(name) => presenter.set_music(&name),
            }
        }

        if stage_dirty {
            presenter.stage_changed(layer);
        }
        shown
    }
}

/// Records everything it is asked to present as plain text lines.
#[derive(Debug, Default)]
pub struct TranscriptPresenter {
    pub lines: Vec<String>,
}

impl TranscriptPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl Presenter for TranscriptPresenter {
    fn show_line(&mut self, speaker: Option<&str>, line: &LineView) {
        match speaker {
            Some(name) => self.lines.push(format!("{name}: {}", line.text)),
            None => self.lines.push(line.text.clone()),
        }
    }

    fn show_choices(&mut self, options: &[ChoiceOption]) {
        for (i, option) in options.iter().enumerate() {
            self.lines.push(format!("[{}] {}", i + 1, option.label));
        }
    }

    fn set_background(&mut self, name: &str) {
        self.lines.push(format!("(background: {name})"));
    }

    fn set_music(&mut self, name: &str) {
        self.lines.push(format!("(music: {name})"));
    }

    fn stage_changed(&mut self, layer: &ActorLayer) {
        let actors: Vec<_> = layer
            .visible_actors()
            .iter()
            .map(|a| format!("{}@{:?}", a.actor_id, a.position))
            .collect();
        self.lines.push(format!("(stage: {})", actors.join(" ")));
    }
}
