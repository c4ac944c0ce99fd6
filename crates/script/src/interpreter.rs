use crate::command::{ChoiceOption, LineView, StageCommand, parse_choices};
use crate::error::ScriptError;
use crate::parser;
use crate::record::{Opcode, Position, ScriptRecord};
use crate::source::ScriptSource;
use novella_common::{
    PortraitPlacement, RecordId, RestoreError, Savable, SavableKind, ScriptState, StateBlob,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the state machine is resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No script loaded yet.
    Unloaded,
    /// Transient: resolving a chain of records.
    Advancing,
    /// A `DIALOG` line is shown; waiting for the host's continue signal.
    AwaitingAdvanceInput,
    /// A `CHOOSE` menu is shown; waiting for a selection.
    AwaitingChoice,
    /// Stopped at the current record after an error (see [`Interpreter::last_error`]).
    Halted,
    /// Ran past the last record.
    Finished,
}

/// Interpreter tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Maximum records resolved in one step without reaching a blocking opcode.
    pub max_chain_steps: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_chain_steps: 10_000,
        }
    }
}

/// What to do after executing one record.
enum Flow {
    /// Move to the next record and keep going.
    Next,
    /// The program counter was already moved; keep going.
    Goto,
    /// Stop and rest in the given state.
    Block(RunState),
}

/// The script state machine.
///
/// Owns the loaded records, the id → index jump table, the program counter and
/// the choice flag. All presentation effects are queued as [`StageCommand`]s.
pub struct Interpreter {
    config: InterpreterConfig,
    source: Box<dyn ScriptSource>,
    script_name: String,
    records: Vec<ScriptRecord>,
    jump_index: HashMap<RecordId, usize>,
    program_counter: usize,
    awaiting_choice: bool,
    choices: Vec<ChoiceOption>,
    state: RunState,
    background: Option<String>,
    music: Option<String>,
    music_volume: f32,
    last_error: Option<ScriptError>,
    outbox: Vec<StageCommand>,
}

impl Interpreter {
    pub fn new(source: impl ScriptSource + 'static) -> Self {
        Self::with_config(source, InterpreterConfig::default())
    }

    pub fn with_config(source: impl ScriptSource + 'static, config: InterpreterConfig) -> Self {
        Self {
            config,
            source: Box::new(source),
            script_name: String::new(),
            records: Vec::new(),
            jump_index: HashMap::new(),
            program_counter: 0,
            awaiting_choice: false,
            choices: Vec::new(),
            state: RunState::Unloaded,
            background: None,
            music: None,
            music_volume: 1.0,
            last_error: None,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn awaiting_choice(&self) -> bool {
        self.awaiting_choice
    }

    /// Options of the pending `CHOOSE`, empty otherwise.
    pub fn choices(&self) -> &[ChoiceOption] {
        &self.choices
    }

    pub fn records(&self) -> &[ScriptRecord] {
        &self.records
    }

    pub fn current_record(&self) -> Option<&ScriptRecord> {
        self.records.get(self.program_counter)
    }

    /// Position of the record with `id` (first occurrence).
    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.jump_index.get(&id).copied()
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn music(&self) -> Option<&str> {
        self.music.as_deref()
    }

    pub fn music_volume(&self) -> f32 {
        self.music_volume
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = volume.clamp(0.0, 1.0);
    }

    /// The error that caused the most recent halt, if any.
    pub fn last_error(&self) -> Option<&ScriptError> {
        self.last_error.as_ref()
    }

    /// Commands queued since the last drain.
    pub fn commands(&self) -> &[StageCommand] {
        &self.outbox
    }

    /// Drain queued commands for the host to apply.
    pub fn drain_commands(&mut self) -> Vec<StageCommand> {
        std::mem::take(&mut self.outbox)
    }

    /// Load a script and run until the first blocking record.
    pub fn load_script(&mut self, name: &str) -> RunState {
        self.last_error = None;
        if !self.load(name) {
            self.state = RunState::Finished;
            return self.state;
        }
        self.run()
    }

    /// Continue past the current `DIALOG` line. Ignored in any other state.
    pub fn advance(&mut self) -> RunState {
        if self.state != RunState::AwaitingAdvanceInput {
            tracing::debug!(state = ?self.state, "advance ignored");
            return self.state;
        }
        self.program_counter += 1;
        self.run()
    }

    /// Select option `index` of the pending `CHOOSE`. Ignored when no choice is pending.
    pub fn choose(&mut self, index: usize) -> RunState {
        if !self.awaiting_choice {
            tracing::debug!("choose ignored: no choice pending");
            return self.state;
        }
        let Some(option) = self.choices.get(index).cloned() else {
            tracing::warn!(index, options = self.choices.len(), "choice index out of range");
            return self.state;
        };
        tracing::debug!(label = %option.label, target = option.target, "choice selected");
        self.awaiting_choice = false;
        self.choices.clear();

        match self.jump_index.get(&option.target) {
            Some(&index) => {
                self.program_counter = index;
                self.run()
            }
            None => {
                self.halt(ScriptError::JumpTargetMissing(option.target));
                self.state
            }
        }
    }

    /// Replace all script state with the script called `name`.
    /// Returns false if it could not be read; state is then empty.
    fn load(&mut self, name: &str) -> bool {
        let name = name.trim();
        let _span = tracing::info_span!("load_script", script = name).entered();
        let text = self.source.read_script(name);
        let records = match text {
            Ok(text) => parser::parse(&text),
            Err(e) => {
                tracing::error!(error = %e, "failed to read script");
                self.install(name, Vec::new());
                self.last_error = Some(e);
                return false;
            }
        };
        tracing::info!(records = records.len(), "script loaded");
        self.install(name, records);
        true
    }

    fn install(&mut self, name: &str, records: Vec<ScriptRecord>) {
        self.jump_index = build_jump_index(&records);
        self.records = records;
        self.script_name = name.to_string();
        self.program_counter = 0;
        self.awaiting_choice = false;
        self.choices.clear();
    }

    /// Resolve records until one blocks, the script ends, or an error halts it.
    fn run(&mut self) -> RunState {
        self.state = RunState::Advancing;
        let mut steps = 0usize;
        loop {
            if steps >= self.config.max_chain_steps {
                self.halt(ScriptError::RunawayChain(steps));
                return self.state;
            }
            steps += 1;

            let Some(record) = self.records.get(self.program_counter).cloned() else {
                tracing::debug!(script = %self.script_name, "reached end of script");
                self.state = RunState::Finished;
                return self.state;
            };

            match self.execute(&record) {
                Flow::Next => self.program_counter += 1,
                Flow::Goto => {}
                Flow::Block(state) => {
                    self.state = state;
                    return state;
                }
            }
        }
    }

    fn execute(&mut self, record: &ScriptRecord) -> Flow {
        tracing::trace!(id = record.id, opcode = record.opcode.token(), "execute");
        match record.opcode {
            Opcode::Dialog => {
                self.place_speaker(record);
                self.outbox.push(StageCommand::ShowLine(LineView {
                    record_id: record.id,
                    actor_id: record.actor_id.clone(),
                    expression: record.expression.clone(),
                    text: record.payload.clone(),
                    speed: record.speed.clone(),
                }));
                Flow::Block(RunState::AwaitingAdvanceInput)
            }
            Opcode::Jump => match self.resolve_jump(&record.payload) {
                Ok(index) => {
                    self.program_counter = index;
                    Flow::Goto
                }
                Err(e) => {
                    self.halt(e);
                    Flow::Block(RunState::Halted)
                }
            },
            Opcode::Load => {
                if self.load(&record.payload) {
                    Flow::Goto
                } else {
                    Flow::Block(RunState::Finished)
                }
            }
            Opcode::Choose => {
                let options = parse_choices(&record.payload);
                if options.is_empty() {
                    tracing::warn!(id = record.id, "CHOOSE has no valid options, skipping");
                    return Flow::Next;
                }
                self.awaiting_choice = true;
                self.choices = options.clone();
                self.outbox.push(StageCommand::ShowChoices(options));
                Flow::Block(RunState::AwaitingChoice)
            }
            Opcode::SetBackground => {
                let name = record.payload.trim().to_string();
                self.background = Some(name.clone());
                self.outbox.push(StageCommand::SetBackground(name));
                Flow::Next
            }
            Opcode::SetMusic => {
                let name = record.payload.trim().to_string();
                self.music = (!name.eq_ignore_ascii_case("STOP")).then(|| name.clone());
                self.outbox.push(StageCommand::SetMusic(name));
                Flow::Next
            }
            Opcode::Focus => {
                if record.actor_id.is_empty() {
                    tracing::warn!(id = record.id, "FOCUS without an actor id, skipping");
                    return Flow::Next;
                }
                let token = record.payload.trim().to_ascii_uppercase();
                let focused = matches!(token.as_str(), "TRUE" | "1" | "ON");
                self.outbox.push(StageCommand::SetFocus {
                    actor_id: record.actor_id.clone(),
                    focused,
                });
                Flow::Next
            }
            Opcode::Hide => {
                let target = match record.payload.trim() {
                    "" => record.actor_id.as_str(),
                    payload => payload,
                };
                if target.is_empty() {
                    tracing::warn!(id = record.id, "HIDE without a target, skipping");
                } else if target.eq_ignore_ascii_case("ALL") {
                    self.outbox.push(StageCommand::HideAll);
                } else {
                    self.outbox.push(StageCommand::HideActor(target.to_string()));
                }
                Flow::Next
            }
        }
    }

    fn place_speaker(&mut self, record: &ScriptRecord) {
        if record.is_narration() {
            return;
        }
        let placement = match &record.position {
            Position::Hide => {
                self.outbox
                    .push(StageCommand::HideActor(record.actor_id.clone()));
                return;
            }
            Position::Keep => PortraitPlacement::KeepCurrent,
            Position::Slot(slot) => PortraitPlacement::Slot(*slot),
            Position::Named(name) => {
                tracing::warn!(id = record.id, position = %name, "unknown position, keeping current");
                PortraitPlacement::KeepCurrent
            }
        };
        self.outbox.push(StageCommand::UpdatePortrait {
            actor_id: record.actor_id.clone(),
            expression: record.expression.clone(),
            placement,
        });
    }

    fn resolve_jump(&self, payload: &str) -> Result<usize, ScriptError> {
        let id: RecordId = payload
            .trim()
            .parse()
            .map_err(|_| ScriptError::InvalidJumpTarget(payload.trim().to_string()))?;
        self.jump_index
            .get(&id)
            .copied()
            .ok_or(ScriptError::JumpTargetMissing(id))
    }

    fn halt(&mut self, error: ScriptError) {
        tracing::error!(
            script = %self.script_name,
            pc = self.program_counter,
            error = %error,
            "script halted"
        );
        self.last_error = Some(error);
        self.state = RunState::Halted;
    }
}

impl Savable for Interpreter {
    fn kind(&self) -> SavableKind {
        SavableKind::Script
    }

    fn capture(&self) -> StateBlob {
        StateBlob::Script(ScriptState {
            script_name: self.script_name.clone(),
            program_counter: self.program_counter,
            awaiting_choice: self.awaiting_choice,
            background: self.background.clone(),
            music: self.music.clone(),
            music_volume: self.music_volume,
        })
    }

    /// Reload the saved script, rebuild the jump index, re-apply background and
    /// music, then re-render the current record.
    fn restore(&mut self, blob: StateBlob) -> Result<(), RestoreError> {
        let saved = match blob {
            StateBlob::Script(saved) => saved,
            other => return Err(RestoreError::mismatch(SavableKind::Script, &other)),
        };

        if saved.script_name.is_empty() {
            self.install("", Vec::new());
            self.state = RunState::Unloaded;
            self.background = saved.background;
            self.music = saved.music;
            self.music_volume = saved.music_volume;
            self.outbox.clear();
            return Ok(());
        }

        // Read before touching anything so a failure leaves current state intact.
        let text = self
            .source
            .read_script(&saved.script_name)
            .map_err(|e| RestoreError::Invalid {
                kind: SavableKind::Script,
                reason: e.to_string(),
            })?;
        let records = parser::parse(&text);
        let at_choice = records
            .get(saved.program_counter)
            .is_some_and(|record| record.opcode == Opcode::Choose);
        if saved.awaiting_choice && !at_choice {
            return Err(RestoreError::Invalid {
                kind: SavableKind::Script,
                reason: format!(
                    "saved choice point {} in '{}' is not a CHOOSE record",
                    saved.program_counter, saved.script_name
                ),
            });
        }

        self.install(&saved.script_name, records);
        self.program_counter = saved.program_counter;
        self.background = saved.background;
        self.music = saved.music;
        self.music_volume = saved.music_volume;
        self.last_error = None;
        self.outbox.clear();

        if let Some(background) = &self.background {
            self.outbox
                .push(StageCommand::SetBackground(background.clone()));
        }
        if let Some(music) = &self.music {
            self.outbox.push(StageCommand::SetMusic(music.clone()));
        }

        tracing::info!(
            script = %self.script_name,
            pc = self.program_counter,
            "interpreter restored"
        );
        self.run();
        Ok(())
    }
}

/// Map each record id to its first position. Later duplicates are ignored.
fn build_jump_index(records: &[ScriptRecord]) -> HashMap<RecordId, usize> {
    let mut index = HashMap::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        if index.contains_key(&record.id) {
            tracing::debug!(id = record.id, position, "duplicate record id, keeping first");
            continue;
        }
        index.insert(record.id, position);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const HEADER: &str = "id,type,actor,expression,position,speed,content\n";

    fn interpreter(scripts: &[(&str, &str)]) -> Interpreter {
        let mut source = MemorySource::new();
        for (name, body) in scripts {
            source.insert(*name, format!("{HEADER}{body}"));
        }
        Interpreter::new(source)
    }

    fn shown_text(commands: &[StageCommand]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                StageCommand::ShowLine(line) => Some(line.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn starts_unloaded() {
        let interp = interpreter(&[]);
        assert_eq!(interp.state(), RunState::Unloaded);
        assert!(interp.commands().is_empty());
    }

    #[test]
    fn hello_line_renders_actor_and_suspends() {
        let mut interp = interpreter(&[("main", r#"1,DIALOG,hero,happy,0,Normal,"Hello""#)]);
        assert_eq!(interp.load_script("main"), RunState::AwaitingAdvanceInput);
        assert_eq!(interp.records().len(), 1);

        let commands = interp.drain_commands();
        assert_eq!(
            commands[0],
            StageCommand::UpdatePortrait {
                actor_id: "hero".into(),
                expression: "happy".into(),
                placement: PortraitPlacement::Slot(0),
            }
        );
        let StageCommand::ShowLine(line) = &commands[1] else {
            panic!("expected ShowLine, got {:?}", commands[1]);
        };
        assert_eq!(line.actor_id, "hero");
        assert_eq!(line.text, "Hello");
        assert_eq!(line.speed.as_deref(), Some("Normal"));
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn advance_walks_lines_then_finishes() {
        let mut interp = interpreter(&[("main", "1,DIALOG,,,,,a\n2,DIALOG,,,,,b")]);
        interp.load_script("main");
        assert_eq!(interp.advance(), RunState::AwaitingAdvanceInput);
        assert_eq!(interp.program_counter(), 1);
        assert_eq!(interp.advance(), RunState::Finished);
        assert_eq!(shown_text(&interp.drain_commands()), vec!["a", "b"]);
        // Terminal: further input is ignored.
        assert_eq!(interp.advance(), RunState::Finished);
    }

    #[test]
    fn narration_does_not_touch_portraits() {
        let mut interp = interpreter(&[("main", "1,DIALOG,,,,,It was dark.")]);
        interp.load_script("main");
        let commands = interp.drain_commands();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], StageCommand::ShowLine(_)));
    }

    #[test]
    fn empty_position_keeps_current_and_hide_position_hides() {
        let mut interp = interpreter(&[(
            "main",
            "1,DIALOG,hero,sad,,,stay\n2,DIALOG,hero,,HIDE,,bye",
        )]);
        interp.load_script("main");
        let commands = interp.drain_commands();
        assert!(matches!(
            &commands[0],
            StageCommand::UpdatePortrait { placement: PortraitPlacement::KeepCurrent, .. }
        ));
        interp.advance();
        let commands = interp.drain_commands();
        assert_eq!(commands[0], StageCommand::HideActor("hero".into()));
    }

    #[test]
    fn jump_reaches_the_record_with_that_id() {
        let mut interp = interpreter(&[(
            "main",
            "1,JUMP,,,,,30\n10,DIALOG,,,,,skipped\n30,DIALOG,,,,,landed",
        )]);
        assert_eq!(interp.load_script("main"), RunState::AwaitingAdvanceInput);
        assert_eq!(interp.program_counter(), 2);
        assert_eq!(interp.index_of(30), Some(2));
        assert_eq!(shown_text(&interp.drain_commands()), vec!["landed"]);
    }

    #[test]
    fn jump_to_missing_id_halts_in_place() {
        let mut interp = interpreter(&[("main", "1,DIALOG,,,,,a\n2,JUMP,,,,,99\n3,DIALOG,,,,,b")]);
        interp.load_script("main");
        assert_eq!(interp.advance(), RunState::Halted);
        assert_eq!(interp.program_counter(), 1);
        assert!(matches!(
            interp.last_error(),
            Some(ScriptError::JumpTargetMissing(99))
        ));
        // Halted scripts do not move on advance.
        assert_eq!(interp.advance(), RunState::Halted);
        assert_eq!(interp.program_counter(), 1);
    }

    #[test]
    fn non_numeric_jump_halts() {
        let mut interp = interpreter(&[("main", "1,JUMP,,,,,ten")]);
        assert_eq!(interp.load_script("main"), RunState::Halted);
        assert!(matches!(
            interp.last_error(),
            Some(ScriptError::InvalidJumpTarget(_))
        ));
    }

    #[test]
    fn duplicate_ids_jump_to_first_occurrence() {
        let mut interp = interpreter(&[(
            "main",
            "1,JUMP,,,,,5\n5,DIALOG,,,,,first\n5,DIALOG,,,,,second",
        )]);
        interp.load_script("main");
        assert_eq!(interp.program_counter(), 1);
        assert_eq!(interp.records().len(), 3);
    }

    #[test]
    fn choose_presents_options_and_jumps_on_selection() {
        let mut interp = interpreter(&[(
            "main",
            "1,CHOOSE,,,,,Go left:10|Go right:20\n10,DIALOG,,,,,left\n20,DIALOG,,,,,right",
        )]);
        assert_eq!(interp.load_script("main"), RunState::AwaitingChoice);
        assert!(interp.awaiting_choice());
        assert_eq!(interp.choices().len(), 2);
        let commands = interp.drain_commands();
        assert!(matches!(&commands[0], StageCommand::ShowChoices(o) if o.len() == 2));

        // Advance does nothing while a choice is pending.
        assert_eq!(interp.advance(), RunState::AwaitingChoice);

        assert_eq!(interp.choose(1), RunState::AwaitingAdvanceInput);
        assert!(!interp.awaiting_choice());
        assert_eq!(interp.current_record().map(|r| r.id), Some(20));
        assert_eq!(shown_text(&interp.drain_commands()), vec!["right"]);
    }

    #[test]
    fn choose_out_of_range_keeps_waiting() {
        let mut interp = interpreter(&[("main", "1,CHOOSE,,,,,A:1|B:1")]);
        interp.load_script("main");
        assert_eq!(interp.choose(5), RunState::AwaitingChoice);
        assert!(interp.awaiting_choice());
    }

    #[test]
    fn choose_with_missing_target_halts() {
        let mut interp = interpreter(&[("main", "1,CHOOSE,,,,,A:404")]);
        interp.load_script("main");
        assert_eq!(interp.choose(0), RunState::Halted);
        assert!(!interp.awaiting_choice());
    }

    #[test]
    fn background_and_music_auto_continue() {
        let mut interp = interpreter(&[(
            "main",
            "1,SET_BACKGROUND,,,,,park\n2,SET_MUSIC,,,,,theme\n3,DIALOG,,,,,hi",
        )]);
        assert_eq!(interp.load_script("main"), RunState::AwaitingAdvanceInput);
        assert_eq!(interp.program_counter(), 2);
        assert_eq!(interp.background(), Some("park"));
        assert_eq!(interp.music(), Some("theme"));
        let commands = interp.drain_commands();
        assert_eq!(commands[0], StageCommand::SetBackground("park".into()));
        assert_eq!(commands[1], StageCommand::SetMusic("theme".into()));
    }

    #[test]
    fn music_stop_clears_current_track() {
        let mut interp = interpreter(&[("main", "1,SET_MUSIC,,,,,theme\n2,SET_MUSIC,,,,,STOP")]);
        interp.load_script("main");
        assert_eq!(interp.music(), None);
    }

    #[test]
    fn focus_tokens() {
        let mut interp = interpreter(&[(
            "main",
            "1,FOCUS,hero,,,,on\n2,FOCUS,hero,,,,nope\n3,FOCUS,,,,,TRUE\n4,DIALOG,,,,,x",
        )]);
        interp.load_script("main");
        let commands = interp.drain_commands();
        assert_eq!(
            commands[0],
            StageCommand::SetFocus {
                actor_id: "hero".into(),
                focused: true
            }
        );
        assert_eq!(
            commands[1],
            StageCommand::SetFocus {
                actor_id: "hero".into(),
                focused: false
            }
        );
        // The actorless FOCUS is skipped, straight to the line.
        assert!(matches!(commands[2], StageCommand::ShowLine(_)));
    }

    #[test]
    fn hide_targets_payload_or_all() {
        let mut interp = interpreter(&[(
            "main",
            "1,HIDE,,,,,villain\n2,HIDE,,,,,all\n3,HIDE,hero,,,,\n4,HIDE,,,,,\n5,DIALOG,,,,,x",
        )]);
        interp.load_script("main");
        let commands = interp.drain_commands();
        assert_eq!(commands[0], StageCommand::HideActor("villain".into()));
        assert_eq!(commands[1], StageCommand::HideAll);
        assert_eq!(commands[2], StageCommand::HideActor("hero".into()));
        assert!(matches!(commands[3], StageCommand::ShowLine(_)));
    }

    #[test]
    fn load_switches_scripts_and_resets_state() {
        let mut interp = interpreter(&[
            ("a", "1,DIALOG,,,,,in a\n2,LOAD,,,,,b"),
            ("b", "100,DIALOG,,,,,in b"),
        ]);
        interp.load_script("a");
        assert_eq!(interp.advance(), RunState::AwaitingAdvanceInput);
        assert_eq!(interp.script_name(), "b");
        assert_eq!(interp.program_counter(), 0);
        assert_eq!(interp.index_of(1), None);
        assert_eq!(interp.index_of(100), Some(0));
        assert_eq!(shown_text(&interp.drain_commands()), vec!["in a", "in b"]);
    }

    #[test]
    fn load_of_missing_script_finishes() {
        let mut interp = interpreter(&[("a", "1,LOAD,,,,,ghost")]);
        assert_eq!(interp.load_script("a"), RunState::Finished);
        assert!(interp.records().is_empty());
        assert!(matches!(
            interp.last_error(),
            Some(ScriptError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn self_jump_is_cut_off() {
        let mut source = MemorySource::new();
        source.insert("loop", format!("{HEADER}1,JUMP,,,,,1"));
        let mut interp = Interpreter::with_config(source, InterpreterConfig { max_chain_steps: 50 });
        assert_eq!(interp.load_script("loop"), RunState::Halted);
        assert!(matches!(
            interp.last_error(),
            Some(ScriptError::RunawayChain(50))
        ));
    }

    #[test]
    fn capture_then_restore_reproduces_position() {
        let mut interp = interpreter(&[(
            "main",
            "1,SET_BACKGROUND,,,,,park\n2,DIALOG,,,,,a\n3,DIALOG,hero,smile,1,,b",
        )]);
        interp.load_script("main");
        interp.advance();
        let blob = interp.capture();

        interp.load_script("main");
        assert_eq!(interp.program_counter(), 1);
        interp.drain_commands();

        interp.restore(blob).unwrap();
        assert_eq!(interp.script_name(), "main");
        assert_eq!(interp.program_counter(), 2);
        assert_eq!(interp.index_of(3), Some(2));
        assert_eq!(interp.state(), RunState::AwaitingAdvanceInput);

        let commands = interp.drain_commands();
        assert_eq!(commands[0], StageCommand::SetBackground("park".into()));
        assert_eq!(shown_text(&commands), vec!["b"]);
    }

    #[test]
    fn restore_mid_choice_waits_for_choice_again() {
        let mut interp = interpreter(&[("main", "1,CHOOSE,,,,,A:2|B:3\n2,DIALOG,,,,,a\n3,DIALOG,,,,,b")]);
        interp.load_script("main");
        let blob = interp.capture();
        interp.choose(0);
        interp.restore(blob).unwrap();
        assert!(interp.awaiting_choice());
        assert_eq!(interp.choices().len(), 2);
    }

    #[test]
    fn restore_rejects_wrong_blob() {
        let mut interp = interpreter(&[("main", "1,DIALOG,,,,,a")]);
        interp.load_script("main");
        let err = interp.restore(StateBlob::Actors(Vec::new())).unwrap_err();
        assert!(matches!(err, RestoreError::TypeMismatch { .. }));
        assert_eq!(interp.script_name(), "main");
        assert_eq!(interp.state(), RunState::AwaitingAdvanceInput);
    }

    #[test]
    fn restore_of_missing_script_keeps_current_state() {
        let mut interp = interpreter(&[("main", "1,DIALOG,,,,,a\n2,DIALOG,,,,,b")]);
        interp.load_script("main");
        interp.advance();
        let blob = StateBlob::Script(ScriptState {
            script_name: "deleted".into(),
            program_counter: 0,
            ..ScriptState::default()
        });
        assert!(interp.restore(blob).is_err());
        assert_eq!(interp.script_name(), "main");
        assert_eq!(interp.program_counter(), 1);
    }

    #[test]
    fn restore_rejects_choice_point_that_is_not_a_choose() {
        let mut interp = interpreter(&[
            ("main", "1,DIALOG,,,,,a\n2,DIALOG,,,,,b"),
            ("edited", "1,DIALOG,,,,,x\n2,DIALOG,,,,,y"),
        ]);
        interp.load_script("main");
        interp.advance();
        let blob = StateBlob::Script(ScriptState {
            script_name: "edited".into(),
            program_counter: 1,
            awaiting_choice: true,
            ..ScriptState::default()
        });
        let err = interp.restore(blob).unwrap_err();
        assert!(matches!(err, RestoreError::Invalid { .. }));
        assert_eq!(interp.script_name(), "main");
        assert_eq!(interp.program_counter(), 1);
        assert_eq!(interp.state(), RunState::AwaitingAdvanceInput);
    }
}
