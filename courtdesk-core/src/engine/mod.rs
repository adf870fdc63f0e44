//! `KioskEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! KioskEngine::new()
//!     └─► start()   → session thread spawned, status = Running
//!         └─► stop() → running=false, active session unwound, status = Stopped
//! ```
//!
//! `start()`/`stop()` return an error when called in the wrong state rather
//! than panicking.
//!
//! ## Threading
//!
//! Hosts call the trigger methods (`presence_confirmed`, `language_button`,
//! `press_key`, `request_stop`, ...) from any thread. Triggers travel over a
//! crossbeam channel to one foreground session thread that owns the
//! `ConversationOrchestrator`; at most one trigger is admitted while the
//! kiosk is busy. The activity watchdog runs on its own thread.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    activity::{ActivityConfig, ActivityGuard, PauseFlag},
    channel::ButtonLatch,
    collab::Collaborators,
    conversation::{ConversationConfig, ConversationOrchestrator, SessionOutcome, SessionTrigger},
    error::{CourtDeskError, Result},
    ipc::{
        events::{DialogEvent, EngineStatus, EngineStatusEvent, SessionStatusEvent},
        DialogEventBus, BROADCAST_CAP,
    },
    language::Language,
    presence::{FaceBox, PresenceConfig, PresenceDebouncer},
};

/// How often the idle session thread checks whether it should exit.
const TRIGGER_POLL: Duration = Duration::from_millis(50);

/// Configuration for `KioskEngine`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub activity: ActivityConfig,
    pub conversation: ConversationConfig,
    pub presence: PresenceConfig,
}

/// The top-level engine handle.
///
/// `KioskEngine` is `Send + Sync`; all fields use interior mutability. Wrap
/// in `Arc<KioskEngine>` to share it between input sources.
pub struct KioskEngine {
    guard: ActivityGuard,
    latch: ButtonLatch,
    orchestrator: Arc<ConversationOrchestrator>,
    presence: Mutex<PresenceDebouncer>,
    /// `true` while the session thread is alive.
    running: Arc<AtomicBool>,
    /// `true` from trigger admission until the session has finished.
    busy: Arc<AtomicBool>,
    status: Arc<Mutex<EngineStatus>>,
    trigger_tx: Sender<SessionTrigger>,
    trigger_rx: Receiver<SessionTrigger>,
    worker: Mutex<Option<JoinHandle<()>>>,
    last_outcome: Arc<Mutex<Option<SessionOutcome>>>,
    session_tx: broadcast::Sender<SessionStatusEvent>,
    events: DialogEventBus,
    engine_tx: broadcast::Sender<EngineStatusEvent>,
}

impl KioskEngine {
    /// Create a new engine. Does not accept triggers until `start()`.
    pub fn new(config: EngineConfig, collab: Collaborators) -> Self {
        let guard = ActivityGuard::new(config.activity.clone());
        let latch = ButtonLatch::new(guard.clone());
        let events = DialogEventBus::new();
        let (session_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (engine_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (trigger_tx, trigger_rx) = crossbeam_channel::unbounded();

        let orchestrator = Arc::new(ConversationOrchestrator::new(
            config.conversation,
            guard.clone(),
            latch.clone(),
            collab,
            events.clone(),
            session_tx.clone(),
        ));

        Self {
            guard,
            latch,
            orchestrator,
            presence: Mutex::new(PresenceDebouncer::new(config.presence)),
            running: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            trigger_tx,
            trigger_rx,
            worker: Mutex::new(None),
            last_outcome: Arc::new(Mutex::new(None)),
            session_tx,
            events,
            engine_tx,
        }
    }

    /// Spawn the session thread.
    ///
    /// # Errors
    /// - `CourtDeskError::AlreadyRunning` if already started.
    /// - `CourtDeskError::Io` if the thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CourtDeskError::AlreadyRunning);
        }

        // Triggers queued while stopped are stale.
        while self.trigger_rx.try_recv().is_ok() {}
        self.busy.store(false, Ordering::SeqCst);
        self.guard.clear_flags();

        let orchestrator = Arc::clone(&self.orchestrator);
        let rx = self.trigger_rx.clone();
        let running = Arc::clone(&self.running);
        let busy = Arc::clone(&self.busy);
        let last_outcome = Arc::clone(&self.last_outcome);

        let spawned = std::thread::Builder::new()
            .name("courtdesk-session".into())
            .spawn(move || session_loop(&orchestrator, &rx, &running, &busy, &last_outcome));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                self.set_status(EngineStatus::Running, None);
                info!("engine started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Stopped, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Stop the session thread, cancelling any running session first.
    ///
    /// # Errors
    /// - `CourtDeskError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(CourtDeskError::NotRunning);
        }

        info!("engine stop requested");
        self.guard.request_stop();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("session thread panicked");
            }
        }
        self.guard.clear_flags();
        self.latch.clear_latch();
        self.set_status(EngineStatus::Stopped, None);
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A session is queued or running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The presence sensor confirmed a visitor. Ignored while the camera is
    /// paused or a session is already underway.
    pub fn presence_confirmed(&self) -> bool {
        if self.guard.is_flag_set(PauseFlag::Camera) {
            debug!("presence ignored: camera paused");
            return false;
        }
        self.admit(SessionTrigger::Presence)
    }

    /// Feed one camera frame's face detections through the debouncer.
    /// Returns `true` when this frame started a session.
    pub fn observe_frame(&self, faces: &[FaceBox], frame_width: u32, frame_height: u32) -> bool {
        let paused = self.guard.is_flag_set(PauseFlag::Camera);
        let confirmed =
            self.presence
                .lock()
                .observe(faces, frame_width, frame_height, Instant::now(), paused);
        confirmed && self.presence_confirmed()
    }

    /// A language button starts a session with the language already chosen.
    pub fn language_button(&self, language: Language) -> bool {
        self.admit(SessionTrigger::LanguageButton(language))
    }

    /// Latch a keypad press for the running session. Presses while idle are
    /// dropped so they cannot answer the next visitor's first question.
    pub fn press_key(&self, key: char) -> bool {
        if !self.is_busy() {
            debug!(%key, "key ignored: no session");
            return false;
        }
        self.latch.press(key);
        true
    }

    /// The Stop button.
    pub fn request_stop(&self) {
        info!("stop requested");
        self.guard.request_stop();
    }

    /// The Reset button: stop now, full reset shortly after.
    pub fn request_reset(&self) {
        info!("reset requested");
        self.guard.request_reset();
    }

    pub fn guard(&self) -> &ActivityGuard {
        &self.guard
    }

    pub fn latch(&self) -> &ButtonLatch {
        &self.latch
    }

    pub fn orchestrator(&self) -> &ConversationOrchestrator {
        &self.orchestrator
    }

    /// Outcome of the most recently finished session.
    pub fn last_outcome(&self) -> Option<SessionOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Subscribe to session state transitions.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.session_tx.subscribe()
    }

    /// Subscribe to prompt / heard / key events.
    pub fn subscribe_dialog(&self) -> broadcast::Receiver<DialogEvent> {
        self.events.subscribe()
    }

    /// Subscribe to engine lifecycle changes.
    pub fn subscribe_engine(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.engine_tx.subscribe()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn admit(&self, trigger: SessionTrigger) -> bool {
        if !self.is_running() {
            warn!(?trigger, "trigger ignored: engine not running");
            return false;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?trigger, "trigger ignored: session in progress");
            return false;
        }
        if self.trigger_tx.send(trigger).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return false;
        }
        debug!(?trigger, "trigger queued");
        true
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.engine_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for KioskEngine {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

fn session_loop(
    orchestrator: &ConversationOrchestrator,
    rx: &Receiver<SessionTrigger>,
    running: &AtomicBool,
    busy: &AtomicBool,
    last_outcome: &Mutex<Option<SessionOutcome>>,
) {
    while running.load(Ordering::SeqCst) {
        let trigger = match rx.recv_timeout(TRIGGER_POLL) {
            Ok(trigger) => trigger,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let outcome = orchestrator.run_session(trigger);
        info!(
            session = outcome.session.id,
            terminal = ?outcome.terminal,
            "session ended"
        );
        *last_outcome.lock() = Some(outcome);
        busy.store(false, Ordering::SeqCst);
    }
    debug!("session thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::stub::{CannedCaseRecords, IdentityTranslator, RecordingSynthesizer, ScriptedRecognizer};

    fn engine() -> KioskEngine {
        let collab = Collaborators::new(
            ScriptedRecognizer::new(Vec::new()),
            RecordingSynthesizer::new(),
            IdentityTranslator,
            CannedCaseRecords::new(),
        );
        KioskEngine::new(EngineConfig::default(), collab)
    }

    #[test]
    fn start_and_stop_are_checked() {
        let engine = engine();
        assert!(matches!(engine.stop(), Err(CourtDeskError::NotRunning)));
        engine.start().expect("start");
        assert_eq!(engine.status(), EngineStatus::Running);
        assert!(matches!(engine.start(), Err(CourtDeskError::AlreadyRunning)));
        engine.stop().expect("stop");
        assert_eq!(engine.status(), EngineStatus::Stopped);
        engine.start().expect("restart");
    }

    #[test]
    fn triggers_need_a_running_engine() {
        let engine = engine();
        assert!(!engine.presence_confirmed());
        assert!(!engine.language_button(Language::En));
    }

    #[test]
    fn presence_is_ignored_while_camera_paused() {
        let engine = engine();
        engine.start().expect("start");
        engine.guard().set_flag(PauseFlag::Camera, true);
        assert!(!engine.presence_confirmed());
        assert!(!engine.is_busy());
    }

    #[test]
    fn idle_key_presses_are_dropped() {
        let engine = engine();
        engine.start().expect("start");
        assert!(!engine.press_key('1'));
        assert_eq!(engine.latch().get_latched_key(), None);
    }

    #[test]
    fn engine_status_is_broadcast() {
        let engine = engine();
        let mut rx = engine.subscribe_engine();
        engine.start().expect("start");
        let event = rx.try_recv().expect("status event");
        assert_eq!(event.status, EngineStatus::Running);
    }
}
