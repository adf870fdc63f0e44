//! Keypad latch.
//!
//! The keypad source calls [`ButtonLatch::press`] from any thread. The most
//! recent digit is held until a dialogue step consumes it or the session
//! ends. A new press overwrites an unconsumed one.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Capture, CaptureRequest, InputChannel, RawAnswer};
use crate::activity::{ActivityGuard, CancelToken, IdleWindow};

#[derive(Clone)]
pub struct ButtonLatch {
    key: Arc<Mutex<Option<char>>>,
    guard: ActivityGuard,
}

impl ButtonLatch {
    pub fn new(guard: ActivityGuard) -> Self {
        Self {
            key: Arc::new(Mutex::new(None)),
            guard,
        }
    }

    /// Latch `key`. A press is user activity, so the watchdog is re-armed.
    pub fn press(&self, key: char) {
        let previous = self.key.lock().replace(key);
        debug!(%key, ?previous, "key latched");
        self.guard.touch_window(IdleWindow::Conversation);
    }

    pub fn get_latched_key(&self) -> Option<char> {
        *self.key.lock()
    }

    pub fn is_latched(&self) -> bool {
        self.key.lock().is_some()
    }

    pub fn clear_latch(&self) {
        self.key.lock().take();
    }

    /// Consume the latched key.
    pub fn take(&self) -> Option<char> {
        self.key.lock().take()
    }
}

impl std::fmt::Debug for ButtonLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonLatch")
            .field("key", &*self.key.lock())
            .finish()
    }
}

/// The keypad as an input channel: answers immediately with the latched key,
/// or with nothing.
#[derive(Debug, Clone)]
pub struct ButtonChannel {
    latch: ButtonLatch,
}

impl ButtonChannel {
    pub fn new(latch: ButtonLatch) -> Self {
        Self { latch }
    }

    pub fn latch(&self) -> &ButtonLatch {
        &self.latch
    }
}

impl InputChannel for ButtonChannel {
    fn capture(&self, request: &CaptureRequest, cancel: &CancelToken) -> Capture {
        if let Some(reason) = cancel.stop_reason().filter(|r| r.ends_session()) {
            return Capture::Cancelled(reason);
        }
        if !request.accepts_buttons {
            return Capture::Nothing;
        }
        match self.latch.take() {
            Some(key) => Capture::Answer(RawAnswer::Button(key)),
            None => Capture::Nothing,
        }
    }
}
