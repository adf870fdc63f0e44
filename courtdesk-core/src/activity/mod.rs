//! Process-wide cooperative signalling.
//!
//! ## State
//!
//! ```text
//! cameraPaused  speakPaused  conversationPaused  listenPaused  stopSystem
//! lastActivity  watchdogDeadline  epoch
//! ```
//!
//! Every read and write goes through named methods on one mutex-guarded
//! struct. The watchdog thread holds at most one pending deadline; `touch`
//! replaces it and expiry calls `reset_all` exactly once.
//!
//! `reset_all` bumps `epoch`, which cancels every `CancelToken` issued before
//! it. That is how an inactivity reset forces a running session to unwind.

pub mod cancel;
mod watchdog;

pub use cancel::{CancelToken, StopReason};

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use watchdog::Watchdog;

/// One of the four cooperative pause flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseFlag {
    /// Presence sensing is suspended (a session is running or stop was pressed).
    Camera,
    /// Prompt playback must stop.
    Speak,
    /// No new dialogue work may start.
    Conversation,
    /// Voice capture must stop.
    Listen,
}

/// Why `reset_all` ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetCause {
    /// The inactivity deadline passed.
    Watchdog,
    /// A caller invoked `reset_all` directly.
    Direct,
}

/// Named inactivity windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleWindow {
    /// Normal interaction (prompting, listening, keypad).
    Conversation,
    /// After the Stop control.
    AfterStop,
    /// The Close password prompt is open.
    ClosePrompt,
    /// A password digit was entered.
    PasswordEntry,
    /// An explicit reset request.
    ResetRequest,
}

/// Inactivity deadlines.
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    /// Default: 90 s.
    pub conversation_idle: Duration,
    /// Default: 30 s.
    pub after_stop_idle: Duration,
    /// Default: 30 s.
    pub close_prompt_idle: Duration,
    /// Default: 10 s.
    pub password_entry_idle: Duration,
    /// Default: 0.5 s.
    pub reset_delay: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            conversation_idle: Duration::from_secs(90),
            after_stop_idle: Duration::from_secs(30),
            close_prompt_idle: Duration::from_secs(30),
            password_entry_idle: Duration::from_secs(10),
            reset_delay: Duration::from_millis(500),
        }
    }
}

impl ActivityConfig {
    pub fn window(&self, window: IdleWindow) -> Duration {
        match window {
            IdleWindow::Conversation => self.conversation_idle,
            IdleWindow::AfterStop => self.after_stop_idle,
            IdleWindow::ClosePrompt => self.close_prompt_idle,
            IdleWindow::PasswordEntry => self.password_entry_idle,
            IdleWindow::ResetRequest => self.reset_delay,
        }
    }
}

/// Point-in-time copy of the activity state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    pub camera_paused: bool,
    pub speak_paused: bool,
    pub conversation_paused: bool,
    pub listen_paused: bool,
    pub stop_system: bool,
    pub idle_for_ms: u64,
    pub watchdog_remaining_ms: Option<u64>,
    pub epoch: u64,
}

impl ActivitySnapshot {
    /// `true` when no pause flag and no stop request is set.
    pub fn is_clear(&self) -> bool {
        !(self.camera_paused
            || self.speak_paused
            || self.conversation_paused
            || self.listen_paused
            || self.stop_system)
    }
}

#[derive(Debug)]
struct ActivityState {
    camera_paused: bool,
    speak_paused: bool,
    conversation_paused: bool,
    listen_paused: bool,
    stop_system: bool,
    last_activity: Instant,
    watchdog_deadline: Option<Instant>,
    epoch: u64,
}

impl ActivityState {
    fn new() -> Self {
        Self {
            camera_paused: false,
            speak_paused: false,
            conversation_paused: false,
            listen_paused: false,
            stop_system: false,
            last_activity: Instant::now(),
            watchdog_deadline: None,
            epoch: 0,
        }
    }

    fn flag_mut(&mut self, flag: PauseFlag) -> &mut bool {
        match flag {
            PauseFlag::Camera => &mut self.camera_paused,
            PauseFlag::Speak => &mut self.speak_paused,
            PauseFlag::Conversation => &mut self.conversation_paused,
            PauseFlag::Listen => &mut self.listen_paused,
        }
    }

    fn flag(&self, flag: PauseFlag) -> bool {
        match flag {
            PauseFlag::Camera => self.camera_paused,
            PauseFlag::Speak => self.speak_paused,
            PauseFlag::Conversation => self.conversation_paused,
            PauseFlag::Listen => self.listen_paused,
        }
    }

    fn clear(&mut self) {
        self.camera_paused = false;
        self.speak_paused = false;
        self.conversation_paused = false;
        self.listen_paused = false;
        self.stop_system = false;
    }
}

/// Callback invoked after every `reset_all`, e.g. to close a password prompt.
pub type ResetObserver = Box<dyn Fn(ResetCause) + Send + Sync>;

struct GuardShared {
    config: ActivityConfig,
    state: Mutex<ActivityState>,
    watchdog: Watchdog,
    observers: Mutex<Vec<ResetObserver>>,
    resets: AtomicU64,
}

impl GuardShared {
    fn reset_all(&self, cause: ResetCause) {
        {
            let mut state = self.state.lock();
            state.clear();
            state.epoch += 1;
            state.watchdog_deadline = None;
            if cause == ResetCause::Direct {
                self.watchdog.disarm();
            }
            info!(?cause, epoch = state.epoch, "activity reset");
        }
        self.resets.fetch_add(1, Ordering::SeqCst);
        for observer in self.observers.lock().iter() {
            observer(cause);
        }
    }
}

/// Shared handle to the process-wide activity state.
///
/// `ActivityGuard` is `Send + Sync` and cheap to clone; every clone refers
/// to the same state and the same watchdog.
#[derive(Clone)]
pub struct ActivityGuard {
    shared: Arc<GuardShared>,
}

impl ActivityGuard {
    /// Create the guard and start its watchdog thread. The watchdog is not
    /// armed until the first `touch`.
    pub fn new(config: ActivityConfig) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<GuardShared>| {
            let weak = weak.clone();
            GuardShared {
                config,
                state: Mutex::new(ActivityState::new()),
                watchdog: Watchdog::spawn(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.reset_all(ResetCause::Watchdog);
                    }
                }),
                observers: Mutex::new(Vec::new()),
                resets: AtomicU64::new(0),
            }
        });
        Self { shared }
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.shared.config
    }

    /// Record activity and (re)arm the watchdog to fire `timeout` from now.
    /// Replaces any pending deadline.
    pub fn touch(&self, timeout: Duration) {
        let mut state = self.shared.state.lock();
        let now = Instant::now();
        state.last_activity = now;
        state.watchdog_deadline = Some(now + timeout);
        self.shared.watchdog.arm(timeout);
    }

    /// `touch` with one of the configured windows.
    pub fn touch_window(&self, window: IdleWindow) {
        self.touch(self.shared.config.window(window));
    }

    /// Clear every flag and `stopSystem`, cancel all outstanding tokens and
    /// notify reset observers. Does not re-arm the watchdog.
    pub fn reset_all(&self) {
        self.shared.reset_all(ResetCause::Direct);
    }

    /// Set `stopSystem` and all four pause flags in one step. The watchdog is
    /// re-armed with the after-stop window so the kiosk recovers on its own.
    pub fn request_stop(&self) {
        {
            let mut state = self.shared.state.lock();
            state.stop_system = true;
            state.camera_paused = true;
            state.speak_paused = true;
            state.conversation_paused = true;
            state.listen_paused = true;
        }
        info!("stop requested");
        self.touch_window(IdleWindow::AfterStop);
    }

    /// Stop now; the watchdog performs `reset_all` after the reset delay.
    pub fn request_reset(&self) {
        self.request_stop();
        info!("reset requested");
        self.touch_window(IdleWindow::ResetRequest);
    }

    /// `true` if `stopSystem` or `flag` is set.
    pub fn is_cancelled(&self, flag: PauseFlag) -> bool {
        let state = self.shared.state.lock();
        state.stop_system || state.flag(flag)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stop_system
    }

    pub fn is_flag_set(&self, flag: PauseFlag) -> bool {
        self.shared.state.lock().flag(flag)
    }

    pub fn set_flag(&self, flag: PauseFlag, value: bool) {
        *self.shared.state.lock().flag_mut(flag) = value;
    }

    /// Clear the four flags and `stopSystem` without bumping the epoch or
    /// notifying observers. Used between sessions.
    pub fn clear_flags(&self) {
        self.shared.state.lock().clear();
        debug!("activity flags cleared");
    }

    /// Number of `reset_all` runs since creation.
    pub fn reset_count(&self) -> u64 {
        self.shared.resets.load(Ordering::SeqCst)
    }

    pub fn epoch(&self) -> u64 {
        self.shared.state.lock().epoch
    }

    pub fn on_reset<F>(&self, observer: F)
    where
        F: Fn(ResetCause) + Send + Sync + 'static,
    {
        self.shared.observers.lock().push(Box::new(observer));
    }

    /// Token that observes `stopSystem`, `scope` (if any) and resets
    /// happening after this call.
    pub fn cancel_token(&self, scope: Option<PauseFlag>) -> CancelToken {
        CancelToken::new(self.clone(), self.epoch(), scope)
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        let state = self.shared.state.lock();
        let now = Instant::now();
        ActivitySnapshot {
            camera_paused: state.camera_paused,
            speak_paused: state.speak_paused,
            conversation_paused: state.conversation_paused,
            listen_paused: state.listen_paused,
            stop_system: state.stop_system,
            idle_for_ms: now.duration_since(state.last_activity).as_millis() as u64,
            watchdog_remaining_ms: state
                .watchdog_deadline
                .map(|d| d.saturating_duration_since(now).as_millis() as u64),
            epoch: state.epoch,
        }
    }
}

impl Default for ActivityGuard {
    fn default() -> Self {
        Self::new(ActivityConfig::default())
    }
}

impl std::fmt::Debug for ActivityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityGuard")
            .field("state", &*self.shared.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn fast_config(idle_ms: u64) -> ActivityConfig {
        ActivityConfig {
            conversation_idle: Duration::from_millis(idle_ms),
            after_stop_idle: Duration::from_millis(idle_ms),
            close_prompt_idle: Duration::from_millis(idle_ms),
            password_entry_idle: Duration::from_millis(idle_ms),
            reset_delay: Duration::from_millis(20),
        }
    }

    #[test]
    fn request_stop_sets_every_flag() {
        let guard = ActivityGuard::default();
        guard.request_stop();
        let snap = guard.snapshot();
        assert!(snap.stop_system);
        assert!(snap.camera_paused && snap.speak_paused);
        assert!(snap.conversation_paused && snap.listen_paused);
        assert!(guard.is_cancelled(PauseFlag::Listen));
    }

    #[test]
    fn is_cancelled_checks_only_the_requested_flag() {
        let guard = ActivityGuard::default();
        guard.set_flag(PauseFlag::Speak, true);
        assert!(guard.is_cancelled(PauseFlag::Speak));
        assert!(!guard.is_cancelled(PauseFlag::Listen));
    }

    #[test]
    fn reset_all_clears_flags_and_bumps_epoch() {
        let guard = ActivityGuard::default();
        guard.request_stop();
        let before = guard.epoch();
        guard.reset_all();
        let snap = guard.snapshot();
        assert!(snap.is_clear());
        assert_eq!(snap.epoch, before + 1);
        assert_eq!(guard.reset_count(), 1);
    }

    #[test]
    fn clear_flags_keeps_epoch() {
        let guard = ActivityGuard::default();
        guard.request_stop();
        guard.clear_flags();
        assert!(guard.snapshot().is_clear());
        assert_eq!(guard.epoch(), 0);
        assert_eq!(guard.reset_count(), 0);
    }

    #[test]
    fn watchdog_resets_after_idle_window() {
        let guard = ActivityGuard::new(fast_config(40));
        guard.set_flag(PauseFlag::Camera, true);
        guard.touch_window(IdleWindow::Conversation);
        thread::sleep(Duration::from_millis(250));
        assert_eq!(guard.reset_count(), 1);
        assert!(guard.snapshot().is_clear());
    }

    #[test]
    fn repeated_touches_produce_one_reset() {
        let guard = ActivityGuard::new(fast_config(60));
        for _ in 0..6 {
            guard.touch_window(IdleWindow::Conversation);
            thread::sleep(Duration::from_millis(15));
        }
        thread::sleep(Duration::from_millis(300));
        assert_eq!(guard.reset_count(), 1);
    }

    #[test]
    fn reset_request_resets_after_short_delay() {
        let guard = ActivityGuard::new(fast_config(5_000));
        guard.request_reset();
        assert!(guard.is_stopped());
        thread::sleep(Duration::from_millis(200));
        assert!(!guard.is_stopped());
        assert_eq!(guard.reset_count(), 1);
    }

    #[test]
    fn observers_run_on_every_reset() {
        let guard = ActivityGuard::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        guard.on_reset(move |cause| {
            assert_eq!(cause, ResetCause::Direct);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        guard.reset_all();
        guard.reset_all();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn snapshot_reports_pending_deadline() {
        let guard = ActivityGuard::default();
        assert_eq!(guard.snapshot().watchdog_remaining_ms, None);
        guard.touch(Duration::from_secs(90));
        let remaining = guard
            .snapshot()
            .watchdog_remaining_ms
            .expect("deadline armed");
        assert!(remaining > 89_000 && remaining <= 90_000);
    }
}
