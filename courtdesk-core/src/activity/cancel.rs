//! Cancellation tokens handed to every blocking collaborator call.

use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::{ActivityGuard, PauseFlag};
use crate::channel::button::ButtonLatch;
use crate::error::{CourtDeskError, Result};

/// Poll cadence for [`CancelToken::wait`] and other sleeping loops.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why a token reports cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "flag")]
pub enum StopReason {
    /// `reset_all` ran after the token was issued.
    Reset,
    /// `stopSystem` is set.
    Stopped,
    /// The token's scoped pause flag is set.
    Paused(PauseFlag),
    /// A keypad press was latched; the caller should consume it.
    KeyPressed,
}

impl StopReason {
    /// `true` for everything except a key press, which pre-empts but does not
    /// end the session.
    pub fn ends_session(self) -> bool {
        !matches!(self, StopReason::KeyPressed)
    }
}

/// Cheap, cloneable view of the activity state at the time it was issued.
#[derive(Clone)]
pub struct CancelToken {
    guard: ActivityGuard,
    epoch: u64,
    scope: Option<PauseFlag>,
    interrupt: Option<ButtonLatch>,
}

impl CancelToken {
    pub(super) fn new(guard: ActivityGuard, epoch: u64, scope: Option<PauseFlag>) -> Self {
        Self {
            guard,
            epoch,
            scope,
            interrupt: None,
        }
    }

    /// Same token, also cancelled by a latched key press.
    pub fn interrupted_by(mut self, latch: &ButtonLatch) -> Self {
        self.interrupt = Some(latch.clone());
        self
    }

    /// Same epoch, different pause flag.
    pub fn scoped(&self, flag: PauseFlag) -> Self {
        Self {
            scope: Some(flag),
            ..self.clone()
        }
    }

    pub fn guard(&self) -> &ActivityGuard {
        &self.guard
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        {
            let state = self.guard.shared.state.lock();
            if state.epoch != self.epoch {
                return Some(StopReason::Reset);
            }
            if state.stop_system {
                return Some(StopReason::Stopped);
            }
            if let Some(flag) = self.scope.filter(|f| state.flag(*f)) {
                return Some(StopReason::Paused(flag));
            }
        }
        match &self.interrupt {
            Some(latch) if latch.is_latched() => Some(StopReason::KeyPressed),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// `Err(Cancelled)` once the token is cancelled.
    pub fn check(&self) -> Result<()> {
        match self.stop_reason() {
            Some(_) => Err(CourtDeskError::Cancelled),
            None => Ok(()),
        }
    }

    /// Sleep for `duration` in [`POLL_INTERVAL`] slices. Returns early with
    /// the stop reason if the token is cancelled meanwhile.
    pub fn wait(&self, duration: Duration) -> Option<StopReason> {
        let deadline = Instant::now() + duration;
        loop {
            if let Some(reason) = self.stop_reason() {
                return Some(reason);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("epoch", &self.epoch)
            .field("scope", &self.scope)
            .field("interruptible", &self.interrupt.is_some())
            .finish()
    }
}
