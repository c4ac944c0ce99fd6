//! Interactive terminal player.

use novella_common::{SharedSavable, SlotId};
use novella_persist::{AutoSaveTrigger, GameState, PersistError, PersistEvent, SaveEngine};
use novella_script::{
    ChoiceOption, DirSource, Interpreter, InterpreterConfig, LineView, RunState, StoryVariables,
};
use novella_stage::{ActorLayer, CharacterRoster, Director, Presenter, StageConfig, Typewriter};
use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const TYPE_STEP: Duration = Duration::from_millis(10);

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    Continue,
    Choose(usize),
    Save(SlotId),
    Load(SlotId),
    QuickSave,
    QuickLoad,
    Slots,
    Help,
    Quit,
    Unknown(String),
}

impl PlayerCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Continue;
        }
        if let Ok(n) = line.parse::<usize>() {
            return Self::Choose(n);
        }
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let slot = words.next().map(str::parse::<SlotId>);
        match (verb.as_str(), slot) {
            ("save" | "s", Some(Ok(slot))) => Self::Save(slot),
            ("load" | "l", Some(Ok(slot))) => Self::Load(slot),
            ("quicksave" | "qs", None) => Self::QuickSave,
            ("quickload" | "ql", None) => Self::QuickLoad,
            ("slots", None) => Self::Slots,
            ("help" | "h" | "?", None) => Self::Help,
            ("quit" | "q" | "exit", None) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

const HELP: &str = "\
  <Enter>      continue (or finish the current line)
  <number>     pick a choice
  save <n>     save to slot n        load <n>   load slot n (or `auto`)
  quicksave    save to the auto slot quickload  load the auto slot
  slots        list slots            quit       leave";

/// Stdin lines delivered over a channel so typing can be interrupted.
pub struct LineInput {
    rx: Receiver<String>,
}

impl LineInput {
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { rx })
    }

    /// Blocks; `None` at end of input.
    pub fn next_line(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    pub fn try_line(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

/// Prints dialogue to stdout, typing lines out unless `instant`.
pub struct TerminalPresenter {
    instant: bool,
    input: Rc<LineInput>,
}

impl TerminalPresenter {
    fn type_out(&self, text: &str, speed: Option<&str>) {
        let mut out = std::io::stdout().lock();
        if self.instant {
            let _ = writeln!(out, "{text}");
            return;
        }
        let mut typewriter = Typewriter::new(text, speed);
        let mut printed = 0;
        while !typewriter.is_done() {
            thread::sleep(TYPE_STEP);
            typewriter.tick(TYPE_STEP);
            // Any input while typing skips to the full line.
            if self.input.try_line().is_some() {
                typewriter.finish();
            }
            let fresh: String = text
                .chars()
                .skip(printed)
                .take(typewriter.revealed() - printed)
                .collect();
            printed = typewriter.revealed();
            let _ = write!(out, "{fresh}");
            let _ = out.flush();
        }
        let _ = writeln!(out);
    }
}

impl Presenter for TerminalPresenter {
    fn show_line(&mut self, speaker: Option<&str>, line: &LineView) {
        if let Some(name) = speaker {
            print!("{name}: ");
        }
        self.type_out(&line.text, line.speed.as_deref());
    }

    fn show_choices(&mut self, options: &[ChoiceOption]) {
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option.label);
        }
    }

    fn set_background(&mut self, name: &str) {
        println!("[scene: {name}]");
    }

    fn set_music(&mut self, name: &str) {
        if name.eq_ignore_ascii_case("STOP") {
            println!("[music stops]");
        } else {
            println!("[music: {name}]");
        }
    }

    fn stage_changed(&mut self, layer: &ActorLayer) {
        let actors: Vec<String> = layer
            .visible_actors()
            .iter()
            .map(|a| {
                let focus = if a.focused { "*" } else { "" };
                format!("{focus}{}/{} @{:?}", a.actor_id, a.expression, a.position)
            })
            .collect();
        if actors.is_empty() {
            println!("[stage empty]");
        } else {
            println!("[stage: {}]", actors.join(", "));
        }
    }
}

pub struct SessionOptions {
    pub scripts_dir: PathBuf,
    pub interpreter: InterpreterConfig,
    pub stage: StageConfig,
    pub instant: bool,
}

/// A playthrough: interpreter, stage and save engine wired together.
pub struct Session {
    interpreter: Rc<RefCell<Interpreter>>,
    layer: Rc<RefCell<ActorLayer>>,
    // Registered with the engine so flags survive save and load.
    _vars: Rc<RefCell<StoryVariables>>,
    director: Director,
    presenter: TerminalPresenter,
    engine: SaveEngine,
    input: Rc<LineInput>,
    current_script: String,
    last_tick: Instant,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        roster: CharacterRoster,
        mut engine: SaveEngine,
    ) -> anyhow::Result<Self> {
        let source = DirSource::new(&options.scripts_dir);
        let interpreter = Rc::new(RefCell::new(Interpreter::with_config(
            source,
            options.interpreter,
        )));
        let layer = Rc::new(RefCell::new(ActorLayer::with_config(options.stage)));
        let vars = Rc::new(RefCell::new(StoryVariables::new()));

        let handles: [SharedSavable; 3] = [interpreter.clone(), layer.clone(), vars.clone()];
        for handle in handles {
            engine.register(handle);
        }

        let input = Rc::new(LineInput::spawn()?);
        Ok(Self {
            interpreter,
            layer,
            _vars: vars,
            director: Director::new(roster),
            presenter: TerminalPresenter {
                instant: options.instant,
                input: input.clone(),
            },
            engine,
            input,
            current_script: String::new(),
            last_tick: Instant::now(),
        })
    }

    pub fn start(&mut self, script: &str) {
        info!(script, "starting playthrough");
        self.engine.reset_play_time(0);
        self.interpreter.borrow_mut().load_script(script);
        self.present();
    }

    /// Load `slot`, first letting any background auto-save finish.
    pub fn resume(&mut self, slot: SlotId) -> Result<(), PersistError> {
        if let Some(Err(e)) = self.engine.wait_for_save() {
            println!("Auto-save failed: {e}");
        }
        let report = self.engine.load_from_slot(slot)?;
        debug!(
            %slot,
            restored = report.restored.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "slot loaded"
        );
        println!(
            "Loaded slot {} ({}, played {})",
            slot,
            report.meta.chapter,
            report.meta.formatted_play_time()
        );
        for (kind, error) in &report.failed {
            println!("  could not restore {kind}: {error}");
        }
        self.current_script = self.interpreter.borrow().script_name().to_string();
        self.present();
        Ok(())
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        println!("(Enter to continue, `help` for commands)");
        loop {
            self.pump_engine();
            let state = self.interpreter.borrow().state();
            if matches!(
                state,
                RunState::Finished | RunState::Halted | RunState::Unloaded
            ) {
                break;
            }

            print!("> ");
            let _ = std::io::stdout().flush();
            let Some(line) = self.input.next_line() else {
                break;
            };
            self.pump_engine();

            match PlayerCommand::parse(&line) {
                PlayerCommand::Continue => {
                    if self.interpreter.borrow().awaiting_choice() {
                        println!("Pick a choice by number.");
                        continue;
                    }
                    self.interpreter.borrow_mut().advance();
                    self.present();
                }
                PlayerCommand::Choose(n) => {
                    let count = self.interpreter.borrow().choices().len();
                    if n == 0 || n > count {
                        println!("Choose between 1 and {count}.");
                        continue;
                    }
                    self.interpreter.borrow_mut().choose(n - 1);
                    self.present();
                    self.engine
                        .trigger_auto_save(AutoSaveTrigger::DecisionMade, false);
                }
                PlayerCommand::Save(slot) => {
                    let chapter = self.current_script.clone();
                    match self.engine.save_to_slot(slot, &chapter) {
                        Ok(meta) => println!("Saved to slot {slot} at {}.", meta.save_time),
                        Err(e) => println!("Save failed: {e}"),
                    }
                }
                PlayerCommand::Load(slot) => {
                    if let Err(e) = self.resume(slot) {
                        println!("Load failed: {e}");
                    }
                }
                PlayerCommand::QuickSave => match self.engine.quick_save() {
                    Ok(_) => println!("Quick saved."),
                    Err(e) => println!("Quick save failed: {e}"),
                },
                PlayerCommand::QuickLoad => {
                    if let Err(e) = self.resume(SlotId::Auto) {
                        println!("Quick load failed: {e}");
                    }
                }
                PlayerCommand::Slots => {
                    for meta in self.engine.all_manual_slots() {
                        if meta.is_empty {
                            println!("  {}: (empty)", meta.slot);
                        } else {
                            println!("  {}: {} {}", meta.slot, meta.save_time, meta.chapter);
                        }
                    }
                }
                PlayerCommand::Help => println!("{HELP}"),
                PlayerCommand::Quit => break,
                PlayerCommand::Unknown(text) => println!("Unknown command '{text}'. Try `help`."),
            }
        }
        self.shutdown()
    }

    /// Apply interpreter output, track reads and chapter changes.
    fn present(&mut self) {
        self.engine.set_game_state(GameState::InDialogue);
        let commands = self.interpreter.borrow_mut().drain_commands();
        let shown = self.director.dispatch(
            commands,
            &mut self.layer.borrow_mut(),
            &mut self.presenter,
        );
        let global = self.engine.global_data_mut();
        for id in shown {
            global.mark_read(id);
        }
        self.engine.set_game_state(GameState::Idle);

        let script = self.interpreter.borrow().script_name().to_string();
        if script != self.current_script {
            if !self.current_script.is_empty() {
                self.engine
                    .trigger_auto_save(AutoSaveTrigger::ChapterEnd, false);
            }
            self.current_script = script;
        }
    }

    /// Feed elapsed time to the auto-save timer and report finished saves.
    fn pump_engine(&mut self) {
        let now = Instant::now();
        self.engine.update(now - self.last_tick);
        self.last_tick = now;
        for event in self.engine.drain_events() {
            match event {
                PersistEvent::AutoSaveCompleted {
                    trigger,
                    success: true,
                } => println!("(auto-saved: {})", trigger.label()),
                PersistEvent::AutoSaveCompleted {
                    trigger,
                    success: false,
                } => println!("(auto-save failed: {})", trigger.label()),
                PersistEvent::SaveCompleted { .. } | PersistEvent::Loaded { .. } => {}
            }
        }
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        let state = self.interpreter.borrow().state();
        match state {
            RunState::Finished => {
                println!("The end.");
                self.engine
                    .trigger_auto_save(AutoSaveTrigger::ChapterEnd, false);
            }
            RunState::Halted => {
                let interpreter = self.interpreter.borrow();
                match interpreter.last_error() {
                    Some(e) => println!("Script halted: {e}"),
                    None => println!("Script halted."),
                }
            }
            _ => println!("Bye."),
        }
        if let Some(Err(e)) = self.engine.wait_for_save() {
            println!("Last save failed: {e}");
        }
        self.pump_engine();
        self.engine.save_global_data()?;
        debug!(play_time_secs = self.engine.play_time_secs(), "session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_player_commands() {
        assert_eq!(PlayerCommand::parse(""), PlayerCommand::Continue);
        assert_eq!(PlayerCommand::parse(" 2 "), PlayerCommand::Choose(2));
        assert_eq!(PlayerCommand::parse("save 1"), PlayerCommand::Save(SlotId::Manual(1)));
        assert_eq!(PlayerCommand::parse("LOAD auto"), PlayerCommand::Load(SlotId::Auto));
        assert_eq!(PlayerCommand::parse("qs"), PlayerCommand::QuickSave);
        assert_eq!(PlayerCommand::parse("quickload"), PlayerCommand::QuickLoad);
        assert_eq!(PlayerCommand::parse("q"), PlayerCommand::Quit);
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(
            PlayerCommand::parse("save left"),
            PlayerCommand::Unknown("save left".into())
        );
        assert_eq!(
            PlayerCommand::parse("save"),
            PlayerCommand::Unknown("save".into())
        );
        assert_eq!(
            PlayerCommand::parse("dance"),
            PlayerCommand::Unknown("dance".into())
        );
    }
}
