use crate::archive::{ArchiveData, SaveSlotMeta};
use crate::autosave::{AutoSaveOutcome, AutoSavePolicy, AutoSaveTrigger, GameState};
use crate::config::PersistConfig;
use crate::error::PersistError;
use crate::global::GlobalData;
use crate::store::SlotStore;
use novella_common::{RestoreError, RestorePhase, SavableKind, SharedSavable, SlotId};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Chapter label used by quick saves.
pub const QUICK_SAVE_LABEL: &str = "Quick Save";

/// Notifications for the host, drained with [`SaveEngine::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistEvent {
    SaveCompleted { slot: SlotId, success: bool },
    AutoSaveCompleted { trigger: AutoSaveTrigger, success: bool },
    Loaded { slot: SlotId },
}

/// Outcome of a successful load.
#[derive(Debug)]
pub struct LoadReport {
    pub meta: SaveSlotMeta,
    pub restored: Vec<SavableKind>,
    /// Registered subsystems the slot had no state for.
    pub missing: Vec<SavableKind>,
    /// Subsystems that rejected their blob; they keep their previous state.
    pub failed: Vec<(SavableKind, RestoreError)>,
}

#[derive(Debug, Clone, Copy)]
enum SaveOrigin {
    Manual,
    Auto(AutoSaveTrigger),
}

struct SaveJob {
    slot: SlotId,
    origin: SaveOrigin,
    handle: JoinHandle<Result<SaveSlotMeta, PersistError>>,
}

/// Owns the Savable registry, global data and the auto-save policy, and moves
/// captured state in and out of slots.
///
/// Capture and restore run on the caller's thread. Only encoding and file
/// writes of a save run on a worker, and at most one save is in flight.
pub struct SaveEngine {
    config: PersistConfig,
    store: SlotStore,
    registry: Vec<SharedSavable>,
    global: GlobalData,
    policy: AutoSavePolicy,
    game_state: GameState,
    job: Option<SaveJob>,
    pending_screenshot: Option<Vec<u8>>,
    play_base_secs: u64,
    session_start: Instant,
    events: Vec<PersistEvent>,
}

impl SaveEngine {
    /// Create directories and load (or create) the global data file.
    pub fn open(config: PersistConfig) -> Result<Self, PersistError> {
        let store = SlotStore::open(&config)?;
        let global = GlobalData::load_or_create(&store.global_path())?;
        let policy = AutoSavePolicy::new(config.auto_save_enabled, config.auto_save_interval());
        tracing::info!(
            save_dir = %store.save_dir().display(),
            manual_slots = config.manual_slot_count,
            auto_save = config.auto_save_enabled,
            "save engine ready"
        );
        Ok(Self {
            config,
            store,
            registry: Vec::new(),
            global,
            policy,
            game_state: GameState::Idle,
            job: None,
            pending_screenshot: None,
            play_base_secs: 0,
            session_start: Instant::now(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    // --- registry ---

    /// Register a subsystem. Registering the same handle twice is a no-op.
    pub fn register(&mut self, savable: SharedSavable) -> bool {
        if self.registry.iter().any(|s| Rc::ptr_eq(s, &savable)) {
            return false;
        }
        self.registry.push(savable);
        true
    }

    pub fn unregister(&mut self, savable: &SharedSavable) -> bool {
        let before = self.registry.len();
        self.registry.retain(|s| !Rc::ptr_eq(s, savable));
        before != self.registry.len()
    }

    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    // --- saving ---

    pub fn is_saving(&self) -> bool {
        self.job.is_some()
    }

    /// Bytes to store as the next save's screenshot.
    pub fn set_pending_screenshot(&mut self, png: Vec<u8>) {
        self.pending_screenshot = Some(png);
    }

    /// Save and wait for the write to finish.
    pub fn save_to_slot(&mut self, slot: SlotId, chapter: &str) -> Result<SaveSlotMeta, PersistError> {
        self.reap_finished();
        if self.job.is_some() {
            return Err(PersistError::SaveInFlight);
        }
        let job = self.start_job(slot, chapter, SaveOrigin::Manual)?;
        self.finish_job(job)
    }

    /// Start a save in the background. Collect the result with
    /// [`poll_save`](Self::poll_save), [`wait_for_save`](Self::wait_for_save) or
    /// [`update`](Self::update).
    pub fn begin_save(&mut self, slot: SlotId, chapter: &str) -> Result<(), PersistError> {
        self.reap_finished();
        if self.job.is_some() {
            return Err(PersistError::SaveInFlight);
        }
        self.job = Some(self.start_job(slot, chapter, SaveOrigin::Manual)?);
        Ok(())
    }

    /// The finished save's result, if the worker is done.
    pub fn poll_save(&mut self) -> Option<Result<SaveSlotMeta, PersistError>> {
        if !self.job.as_ref()?.handle.is_finished() {
            return None;
        }
        let job = self.job.take()?;
        Some(self.finish_job(job))
    }

    /// Block until the in-flight save, if any, finishes.
    pub fn wait_for_save(&mut self) -> Option<Result<SaveSlotMeta, PersistError>> {
        let job = self.job.take()?;
        Some(self.finish_job(job))
    }

    pub fn quick_save(&mut self) -> Result<SaveSlotMeta, PersistError> {
        self.save_to_slot(SlotId::Auto, QUICK_SAVE_LABEL)
    }

    /// Fold every registered subsystem's state into a new archive.
    pub fn capture_archive(&self, chapter: &str) -> ArchiveData {
        let mut archive = ArchiveData {
            chapter: chapter.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            play_time_secs: self.play_time_secs(),
            ..ArchiveData::default()
        };
        for savable in &self.registry {
            match savable.try_borrow() {
                Ok(savable) => archive.absorb(savable.capture()),
                Err(_) => tracing::warn!("subsystem busy during capture, skipped"),
            }
        }
        archive
    }

    fn start_job(
        &mut self,
        slot: SlotId,
        chapter: &str,
        origin: SaveOrigin,
    ) -> Result<SaveJob, PersistError> {
        self.check_slot(slot)?;
        let _span = tracing::info_span!("save_slot", slot = %slot).entered();

        let archive = self.capture_archive(chapter);
        let meta = SaveSlotMeta {
            slot,
            save_time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            chapter: chapter.to_string(),
            screenshot: None,
            play_time_secs: archive.play_time_secs,
            is_empty: false,
        };
        let screenshot = self.pending_screenshot.take();
        let store = self.store.clone();

        let handle = thread::Builder::new()
            .name("novella-save".into())
            .spawn(move || write_slot_job(&store, meta, &archive, screenshot))?;
        tracing::debug!(?origin, "save handed to writer");
        Ok(SaveJob {
            slot,
            origin,
            handle,
        })
    }

    fn finish_job(&mut self, job: SaveJob) -> Result<SaveSlotMeta, PersistError> {
        let result = job.handle.join().unwrap_or_else(|_| {
            Err(PersistError::WriteFailure {
                path: self.store.slot_path(job.slot),
                source: std::io::Error::other("save worker panicked"),
            })
        });
        let success = result.is_ok();
        match &result {
            Ok(meta) => tracing::info!(slot = %job.slot, chapter = %meta.chapter, "save committed"),
            Err(e) => tracing::error!(slot = %job.slot, error = %e, "save failed"),
        }
        match job.origin {
            SaveOrigin::Manual => self.events.push(PersistEvent::SaveCompleted {
                slot: job.slot,
                success,
            }),
            SaveOrigin::Auto(trigger) => {
                self.policy.reset();
                self.events
                    .push(PersistEvent::AutoSaveCompleted { trigger, success });
            }
        }
        result
    }

    fn reap_finished(&mut self) {
        // The result is reported through events and logs.
        let _ = self.poll_save();
    }

    // --- loading ---

    /// Restore every registered subsystem from `slot`.
    ///
    /// Nothing is touched unless the whole slot decodes and verifies. Actors go
    /// first, then data subsystems, and the interpreter last.
    ///
    /// Refused with [`PersistError::SaveInFlight`] while a save is running; call
    /// [`wait_for_save`](Self::wait_for_save) first to load right after one.
    /// A slot written under another schema version fails with
    /// [`PersistError::SchemaMismatch`]; treat it like
    /// [`PersistError::CorruptSave`], since in-memory state is equally untouched.
    pub fn load_from_slot(&mut self, slot: SlotId) -> Result<LoadReport, PersistError> {
        self.reap_finished();
        if self.job.is_some() {
            return Err(PersistError::SaveInFlight);
        }
        self.check_slot(slot)?;
        let _span = tracing::info_span!("load_slot", slot = %slot).entered();

        let (meta, archive) = self.store.read_slot(slot).inspect_err(|e| {
            tracing::error!(error = %e, "load failed, state unchanged");
        })?;

        let mut report = LoadReport {
            meta,
            restored: Vec::new(),
            missing: Vec::new(),
            failed: Vec::new(),
        };
        for phase in RestorePhase::ORDER {
            self.restore_phase(phase, &archive, &mut report);
        }

        self.play_base_secs = archive.play_time_secs;
        self.session_start = Instant::now();
        self.events.push(PersistEvent::Loaded { slot });
        tracing::info!(
            restored = report.restored.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "slot loaded"
        );
        Ok(report)
    }

    pub fn quick_load(&mut self) -> Result<LoadReport, PersistError> {
        self.load_from_slot(SlotId::Auto)
    }

    fn restore_phase(&self, phase: RestorePhase, archive: &ArchiveData, report: &mut LoadReport) {
        for savable in &self.registry {
            let Ok(mut subsystem) = savable.try_borrow_mut() else {
                tracing::warn!(?phase, "subsystem busy during restore, skipped");
                continue;
            };
            let kind = subsystem.kind();
            if kind.phase() != phase {
                continue;
            }
            let Some(blob) = archive.blob_for(&kind) else {
                tracing::debug!(%kind, "no saved state");
                report.missing.push(kind);
                continue;
            };
            match subsystem.restore(blob) {
                Ok(()) => report.restored.push(kind),
                Err(e) => {
                    tracing::error!(%kind, error = %e, "restore rejected, subsystem skipped");
                    report.failed.push((kind, e));
                }
            }
        }
    }

    // --- slot queries ---

    fn check_slot(&self, slot: SlotId) -> Result<(), PersistError> {
        match slot {
            SlotId::Manual(n) if n >= self.config.manual_slot_count => {
                Err(PersistError::UnknownSlot(slot))
            }
            _ => Ok(()),
        }
    }

    /// Header of `slot`; an empty-flagged meta when nothing is saved there.
    pub fn get_slot_meta(&self, slot: SlotId) -> Result<SaveSlotMeta, PersistError> {
        self.check_slot(slot)?;
        self.store.read_meta(slot)
    }

    /// Metadata of every manual slot in order. Unreadable slots are reported empty.
    pub fn all_manual_slots(&self) -> Vec<SaveSlotMeta> {
        (0..self.config.manual_slot_count)
            .map(SlotId::Manual)
            .map(|slot| {
                self.store.read_meta(slot).unwrap_or_else(|e| {
                    tracing::warn!(slot = %slot, error = %e, "unreadable slot header");
                    SaveSlotMeta::empty(slot)
                })
            })
            .collect()
    }

    pub fn is_slot_empty(&self, slot: SlotId) -> bool {
        !self.store.exists(slot)
    }

    /// Delete a slot and its screenshot. Returns whether a save existed.
    pub fn delete_slot(&mut self, slot: SlotId) -> Result<bool, PersistError> {
        self.reap_finished();
        if self.job.as_ref().is_some_and(|job| job.slot == slot) {
            return Err(PersistError::SaveInFlight);
        }
        self.check_slot(slot)?;
        let existed = self.store.delete(slot)?;
        tracing::info!(slot = %slot, existed, "slot deleted");
        Ok(existed)
    }

    // --- auto-save ---

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    pub fn set_game_state(&mut self, state: GameState) {
        if self.game_state != state {
            tracing::debug!(from = ?self.game_state, to = ?state, "game state changed");
        }
        self.game_state = state;
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.policy.enabled()
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) {
        self.policy.set_enabled(enabled);
    }

    /// Request an automatic save into the reserved slot.
    ///
    /// Skipped when disabled (unless forced), when a save is in flight, or when
    /// the game is not idle (unless forced). Completion is reported as
    /// [`PersistEvent::AutoSaveCompleted`] once the writer finishes.
    pub fn trigger_auto_save(&mut self, trigger: AutoSaveTrigger, force: bool) -> AutoSaveOutcome {
        self.reap_finished();
        let outcome = self.policy.gate(self.job.is_some(), self.game_state, force);
        if !outcome.started() {
            tracing::debug!(%trigger, ?outcome, state = ?self.game_state, "auto-save skipped");
            return outcome;
        }
        match self.start_job(SlotId::Auto, trigger.label(), SaveOrigin::Auto(trigger)) {
            Ok(job) => {
                tracing::info!(%trigger, "auto-save started");
                self.job = Some(job);
                AutoSaveOutcome::Started
            }
            Err(e) => {
                tracing::error!(%trigger, error = %e, "auto-save could not start");
                self.events
                    .push(PersistEvent::AutoSaveCompleted { trigger, success: false });
                AutoSaveOutcome::Failed
            }
        }
    }

    /// Per-frame hook: collects a finished save and runs the interval timer.
    pub fn update(&mut self, dt: Duration) {
        self.reap_finished();
        if self.policy.tick(dt, self.game_state) && self.job.is_none() {
            self.trigger_auto_save(AutoSaveTrigger::TimeInterval, false);
        }
    }

    // --- play time ---

    /// Restored total plus time since the last load (or since open).
    pub fn play_time_secs(&self) -> u64 {
        self.play_base_secs + self.session_start.elapsed().as_secs()
    }

    /// Start a fresh play clock, e.g. for a new game.
    pub fn reset_play_time(&mut self, base_secs: u64) {
        self.play_base_secs = base_secs;
        self.session_start = Instant::now();
    }

    // --- global data ---

    pub fn global_data(&self) -> &GlobalData {
        &self.global
    }

    pub fn global_data_mut(&mut self) -> &mut GlobalData {
        &mut self.global
    }

    pub fn save_global_data(&self) -> Result<(), PersistError> {
        self.global.save(&self.store.global_path())?;
        tracing::debug!("global data saved");
        Ok(())
    }

    // --- events ---

    pub fn drain_events(&mut self) -> Vec<PersistEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Drop for SaveEngine {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            tracing::debug!(slot = %job.slot, "waiting for in-flight save");
            let _ = job.handle.join();
        }
    }
}

/// Worker body: commit the slot, then the screenshot. A failed screenshot does
/// not fail the save.
fn write_slot_job(
    store: &SlotStore,
    mut meta: SaveSlotMeta,
    archive: &ArchiveData,
    screenshot: Option<Vec<u8>>,
) -> Result<SaveSlotMeta, PersistError> {
    if screenshot.is_some() {
        meta.screenshot = Some(SlotStore::screenshot_name(meta.slot));
    }
    store.write_slot(&meta, archive)?;
    if let Some(png) = screenshot {
        if let Err(e) = store.write_screenshot(meta.slot, &png) {
            tracing::warn!(slot = %meta.slot, error = %e, "screenshot not written");
        }
    }
    Ok(meta)
}
