use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why an automatic save was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoSaveTrigger {
    TimeInterval,
    ChapterEnd,
    PuzzleComplete,
    DecisionMade,
}

impl AutoSaveTrigger {
    /// Chapter label written into the automatic slot's metadata.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TimeInterval => "Auto Save",
            Self::ChapterEnd => "Chapter End",
            Self::PuzzleComplete => "Puzzle Complete",
            Self::DecisionMade => "Key Decision",
        }
    }
}

impl fmt::Display for AutoSaveTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the game is doing; only `Idle` is a safe moment for an unforced auto-save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Idle,
    InDialogue,
    InAnimation,
    InTransition,
    InPuzzle,
}

/// Result of asking for an automatic save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveOutcome {
    /// The save was handed to the writer.
    Started,
    SkippedDisabled,
    SkippedBusy,
    SkippedNotIdle,
    /// Allowed, but capturing or starting the writer failed.
    Failed,
}

impl AutoSaveOutcome {
    pub fn started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

/// Gating rules plus the elapsed-time counter behind `TimeInterval` saves.
#[derive(Debug, Clone)]
pub struct AutoSavePolicy {
    enabled: bool,
    interval: Duration,
    elapsed: Duration,
}

impl AutoSavePolicy {
    pub fn new(enabled: bool, interval: Duration) -> Self {
        Self {
            enabled,
            interval,
            elapsed: Duration::ZERO,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Decide whether a request may proceed. `Started` means go ahead.
    pub fn gate(&self, saving: bool, state: GameState, force: bool) -> AutoSaveOutcome {
        if !self.enabled && !force {
            AutoSaveOutcome::SkippedDisabled
        } else if saving {
            AutoSaveOutcome::SkippedBusy
        } else if !force && state != GameState::Idle {
            AutoSaveOutcome::SkippedNotIdle
        } else {
            AutoSaveOutcome::Started
        }
    }

    /// Advance the counter. Returns true when an interval save is due; the
    /// counter keeps running until [`reset`](Self::reset) after a save completes.
    pub fn tick(&mut self, dt: Duration, state: GameState) -> bool {
        if !self.enabled {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        self.elapsed >= self.interval && state == GameState::Idle
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}
