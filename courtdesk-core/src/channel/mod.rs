//! The two answer sources for a dialogue question.
//!
//! ```text
//!             ┌──────────────┐
//! keypad ───► │ ButtonLatch  │──► ButtonChannel ─┐
//!             └──────────────┘                   ├──► DialogStep race
//! prompt ───► VoiceChannel::say ─► listen ───────┘
//! ```
//!
//! A latched key is checked first every round. Voice capture is interrupted
//! by a key press only on steps that accept buttons.

pub mod button;
pub mod voice;

pub use button::{ButtonChannel, ButtonLatch};
pub use voice::VoiceChannel;

use std::time::Duration;

use crate::activity::{CancelToken, StopReason};
use crate::language::Language;

/// What the current step asks of a channel.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub language: Language,
    pub timeout: Duration,
    pub accepts_buttons: bool,
}

/// An unvalidated answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAnswer {
    Voice(String),
    Button(char),
}

impl RawAnswer {
    pub fn is_button(&self) -> bool {
        matches!(self, RawAnswer::Button(_))
    }

    /// The answer as text; a key becomes its digit.
    pub fn as_text(&self) -> String {
        match self {
            RawAnswer::Voice(text) => text.clone(),
            RawAnswer::Button(key) => key.to_string(),
        }
    }
}

/// Result of one capture round on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Answer(RawAnswer),
    /// The channel had nothing to offer this round.
    Nothing,
    /// Voice capture produced no usable text. Consumes an attempt.
    Unusable(String),
    /// A key press interrupted voice capture; the keypad holds the answer.
    Preempted,
    Cancelled(StopReason),
}

/// A source of one answer per dialogue round.
pub trait InputChannel: Send + Sync {
    fn capture(&self, request: &CaptureRequest, cancel: &CancelToken) -> Capture;
}
