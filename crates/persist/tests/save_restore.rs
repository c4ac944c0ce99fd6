use novella_common::{PositionSlot, SharedSavable, SlotId};
use novella_persist::{AutoSaveOutcome, AutoSaveTrigger, GameState, PersistConfig, SaveEngine};
use novella_script::{Interpreter, MemorySource, RunState, StoryVariables};
use novella_stage::{ActorLayer, Director, TranscriptPresenter};
use std::cell::RefCell;
use std::rc::Rc;

const PROLOGUE: &str = "\
id,type,actor,expression,position,speed,content
1,SET_BACKGROUND,,,,,classroom
2,DIALOG,hero,happy,0,Normal,\"Hello\"
3,DIALOG,rival,smirk,4,,\"Hi, hero.\"
4,CHOOSE,,,,,Be nice:10|Be rude:20
10,DIALOG,hero,smile,,,Nice to meet you.
11,LOAD,,,,,chapter1
20,DIALOG,hero,angry,,,Go away.
21,HIDE,,,,,rival
22,LOAD,,,,,chapter1
";

const CHAPTER1: &str = "\
id,type,actor,expression,position,speed,content
100,HIDE,,,,,ALL
101,DIALOG,,,,,The next morning.
";

struct Game {
    interpreter: Rc<RefCell<Interpreter>>,
    layer: Rc<RefCell<ActorLayer>>,
    vars: Rc<RefCell<StoryVariables>>,
    director: Director,
    out: TranscriptPresenter,
}

impl Game {
    fn new() -> Self {
        let source = MemorySource::new()
            .with("prologue", PROLOGUE)
            .with("chapter1", CHAPTER1);
        Self {
            interpreter: Rc::new(RefCell::new(Interpreter::new(source))),
            layer: Rc::new(RefCell::new(ActorLayer::new())),
            vars: Rc::new(RefCell::new(StoryVariables::new())),
            director: Director::default(),
            out: TranscriptPresenter::new(),
        }
    }

    fn register(&self, engine: &mut SaveEngine) {
        let interpreter: SharedSavable = self.interpreter.clone();
        let layer: SharedSavable = self.layer.clone();
        let vars: SharedSavable = self.vars.clone();
        engine.register(interpreter);
        engine.register(layer);
        engine.register(vars);
    }

    /// Apply queued interpreter output to the stage.
    fn flush(&mut self) -> Vec<String> {
        let commands = self.interpreter.borrow_mut().drain_commands();
        self.director
            .dispatch(commands, &mut self.layer.borrow_mut(), &mut self.out);
        self.out.take()
    }
}

fn engine(root: &std::path::Path) -> SaveEngine {
    SaveEngine::open(PersistConfig::under(root)).unwrap()
}

#[test]
fn save_and_restore_reproduces_script_position_and_stage() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine(tmp.path());
    let mut game = Game::new();
    game.register(&mut engine);

    game.interpreter.borrow_mut().load_script("prologue");
    game.flush();
    game.interpreter.borrow_mut().advance();
    let shown = game.flush();
    assert_eq!(shown.last().map(String::as_str), Some("rival: Hi, hero."));
    game.vars.borrow_mut().set_int("courage", 3);

    engine.save_to_slot(SlotId::Manual(0), "Prologue").unwrap();

    // Move on: choose, switch scripts, clear the stage.
    game.interpreter.borrow_mut().advance();
    game.interpreter.borrow_mut().choose(1);
    game.interpreter.borrow_mut().advance();
    game.flush();
    game.vars.borrow_mut().set_int("courage", 0);
    assert_eq!(game.interpreter.borrow().script_name(), "chapter1");
    assert!(game.layer.borrow().visible_actors().is_empty());

    let report = engine.load_from_slot(SlotId::Manual(0)).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.meta.chapter, "Prologue");

    {
        let interpreter = game.interpreter.borrow();
        assert_eq!(interpreter.script_name(), "prologue");
        assert_eq!(interpreter.current_record().map(|r| r.id), Some(3));
        assert_eq!(interpreter.state(), RunState::AwaitingAdvanceInput);
        assert_eq!(interpreter.background(), Some("classroom"));
    }
    {
        let layer = game.layer.borrow();
        let hero = layer.actor("hero").unwrap();
        assert_eq!(hero.position, PositionSlot::Slot(0));
        assert_eq!(hero.expression, "happy");
        let rival = layer.actor("rival").unwrap();
        assert_eq!(rival.position, PositionSlot::Slot(4));
        assert!(rival.visible);
    }
    assert_eq!(game.vars.borrow().int("courage"), Some(3));

    // The restored interpreter re-presents its line on top of the restored stage.
    let shown = game.flush();
    assert_eq!(shown.first().map(String::as_str), Some("(background: classroom)"));
    assert_eq!(shown.last().map(String::as_str), Some("rival: Hi, hero."));
    assert_eq!(game.layer.borrow().visible_actors().len(), 2);
}

#[test]
fn restore_mid_choice_presents_the_menu_again() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine(tmp.path());
    let mut game = Game::new();
    game.register(&mut engine);

    game.interpreter.borrow_mut().load_script("prologue");
    game.interpreter.borrow_mut().advance();
    game.interpreter.borrow_mut().advance();
    assert!(game.interpreter.borrow().awaiting_choice());
    game.flush();
    engine.quick_save().unwrap();

    game.interpreter.borrow_mut().choose(0);
    game.flush();

    engine.quick_load().unwrap();
    assert!(game.interpreter.borrow().awaiting_choice());
    let shown = game.flush();
    assert_eq!(&shown[shown.len() - 2..], ["[1] Be nice", "[2] Be rude"]);

    game.interpreter.borrow_mut().choose(1);
    assert_eq!(game.interpreter.borrow().current_record().map(|r| r.id), Some(20));
}

#[test]
fn a_fresh_session_resumes_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut engine = engine(tmp.path());
        let game = Game::new();
        game.register(&mut engine);
        game.interpreter.borrow_mut().load_script("prologue");
        game.interpreter.borrow_mut().advance();
        engine.set_game_state(GameState::Idle);
        assert_eq!(
            engine.trigger_auto_save(AutoSaveTrigger::DecisionMade, false),
            AutoSaveOutcome::Started
        );
    }

    // Dropping the engine waited for the writer.
    let mut engine = engine(tmp.path());
    let mut game = Game::new();
    game.register(&mut engine);
    let meta = engine.get_slot_meta(SlotId::Auto).unwrap();
    assert_eq!(meta.chapter, AutoSaveTrigger::DecisionMade.label());

    engine.load_from_slot(SlotId::Auto).unwrap();
    assert_eq!(game.interpreter.borrow().program_counter(), 2);
    assert_eq!(game.flush().last().map(String::as_str), Some("rival: Hi, hero."));
}

#[test]
fn corrupt_slot_does_not_disturb_a_running_game() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine(tmp.path());
    let mut game = Game::new();
    game.register(&mut engine);
    game.interpreter.borrow_mut().load_script("prologue");
    engine.save_to_slot(SlotId::Manual(2), "").unwrap();
    game.interpreter.borrow_mut().advance();
    game.flush();

    let path = engine.store().slot_path(SlotId::Manual(2));
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() - 10;
    bytes[mid] ^= 0x5a;
    std::fs::write(&path, bytes).unwrap();

    assert!(engine.load_from_slot(SlotId::Manual(2)).is_err());
    assert_eq!(game.interpreter.borrow().current_record().map(|r| r.id), Some(3));
    assert!(game.layer.borrow().actor("rival").is_some());
}
