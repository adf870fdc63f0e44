//! Event types broadcast to hosts (subtitle panes, text boxes, status lights).
//!
//! ## Channels
//!
//! | Event | Subscribe with |
//! |-------|----------------|
//! | `SessionStatusEvent` | `KioskEngine::subscribe_status` |
//! | `DialogEvent` | `KioskEngine::subscribe_dialog` |
//! | `EngineStatusEvent` | `KioskEngine::subscribe_engine` |

use serde::{Deserialize, Serialize};

use crate::language::Language;

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Where a session is in the dialogue pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    AwaitingLanguage,
    AwaitingEstablishment,
    AwaitingCategory,
    CapturingField,
    Dispatching,
    PlayingResult,
    Cancelled,
    Failed,
    Completed,
}

impl SessionState {
    /// `Cancelled`, `Failed` and `Completed` end a session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Cancelled | SessionState::Failed | SessionState::Completed
        )
    }
}

/// Emitted on every session state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub session_id: u64,
    pub state: SessionState,
    /// Field name while capturing, failure reason on `Failed`.
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Dialog events
// ---------------------------------------------------------------------------

/// What a `DialogEvent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DialogEventKind {
    /// Text about to be spoken (subtitle).
    Prompt,
    /// Text the recognizer returned.
    Heard,
    /// A latched key consumed as an answer.
    KeyConsumed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub kind: DialogEventKind,
    pub text: String,
    pub language: Language,
}

// ---------------------------------------------------------------------------
// Engine status
// ---------------------------------------------------------------------------

/// Lifecycle of the kiosk engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created, `start()` not yet called.
    Idle,
    /// Waiting for triggers or running a session.
    Running,
    /// Session thread stopped; the engine may be restarted.
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    pub detail: Option<String>,
}
