use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use courtdesk_core::activity::{ActivityConfig, ActivityGuard, ResetCause, StopReason};
use courtdesk_core::channel::ButtonLatch;
use courtdesk_core::collab::stub::{
    CannedCaseRecords, Heard, IdentityTranslator, RecordingSynthesizer, ScriptedRecognizer,
};
use courtdesk_core::conversation::{ConversationConfig, ConversationOrchestrator, SessionTrigger};
use courtdesk_core::ipc::events::SessionState;
use courtdesk_core::ipc::DialogEventBus;
use courtdesk_core::{Collaborators, Language};
use tokio::sync::broadcast;

fn short_windows() -> ActivityConfig {
    ActivityConfig {
        conversation_idle: Duration::from_millis(150),
        after_stop_idle: Duration::from_millis(150),
        reset_delay: Duration::from_millis(50),
        ..ActivityConfig::default()
    }
}

fn orchestrator(guard: &ActivityGuard, recognizer: ScriptedRecognizer) -> ConversationOrchestrator {
    let latch = ButtonLatch::new(guard.clone());
    let collab = Collaborators::new(
        recognizer,
        RecordingSynthesizer::new(),
        IdentityTranslator,
        CannedCaseRecords::new(),
    );
    let (status_tx, _) = broadcast::channel(64);
    let config = ConversationConfig {
        greet: false,
        listen_timeout: Duration::from_secs(5),
        ..ConversationConfig::default()
    };
    ConversationOrchestrator::new(config, guard.clone(), latch, collab, DialogEventBus::new(), status_tx)
}

#[test]
fn idle_visitor_is_reset_by_the_watchdog_exactly_once() {
    let guard = ActivityGuard::new(short_windows());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    guard.on_reset(move |cause| {
        assert_eq!(cause, ResetCause::Watchdog);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // The visitor walks away while the kiosk is listening.
    let kiosk = orchestrator(&guard, ScriptedRecognizer::new([Heard::WaitForCancel]));
    let started = Instant::now();
    let outcome = kiosk.run_session(SessionTrigger::LanguageButton(Language::En));

    assert_eq!(outcome.terminal, SessionState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2), "watchdog did not cut the wait short");

    // No further deadline is armed once the session has unwound.
    thread::sleep(Duration::from_millis(400));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(guard.reset_count(), 1);
    assert!(guard.snapshot().is_clear());
}

#[test]
fn reset_request_resets_after_the_short_delay() {
    let guard = ActivityGuard::new(short_windows());
    let token = guard.cancel_token(None);

    guard.request_reset();
    assert_eq!(token.stop_reason(), Some(StopReason::Stopped));
    assert!(guard.snapshot().stop_system);

    let deadline = Instant::now() + Duration::from_secs(2);
    while guard.reset_count() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(guard.reset_count(), 1);
    assert!(guard.snapshot().is_clear());
    assert_eq!(token.stop_reason(), Some(StopReason::Reset));
}

#[test]
fn stop_recovers_after_the_after_stop_window() {
    let guard = ActivityGuard::new(short_windows());
    guard.touch_window(courtdesk_core::activity::IdleWindow::Conversation);
    guard.request_stop();
    assert!(guard.snapshot().camera_paused);

    thread::sleep(Duration::from_millis(400));
    assert_eq!(guard.reset_count(), 1);
    assert!(!guard.snapshot().camera_paused);
}
