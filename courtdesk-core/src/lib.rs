//! # courtdesk-core
//!
//! Dialogue orchestration core for a court case-records kiosk.
//!
//! ## Architecture
//!
//! ```text
//! presence / language button ─► KioskEngine trigger queue ─► session thread
//!                                                                │
//!                                                 ConversationOrchestrator
//!                                                                │
//!                                      DialogStep ◄─► VoiceChannel | ButtonChannel
//!                                                                │
//!                                       CaseRecordsApi ─► narration ─► speech
//!
//! ActivityGuard (flags + watchdog) is consulted at every poll point.
//! ```
//!
//! Speech recognition, speech synthesis, translation and the HTTP
//! case-records service are collaborators behind the traits in [`collab`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod activity;
pub mod channel;
pub mod collab;
pub mod conversation;
pub mod dialog;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod language;
pub mod normalize;
pub mod presence;

// Convenience re-exports for downstream crates
pub use activity::{ActivityConfig, ActivityGuard, PauseFlag};
pub use collab::{
    ApiReply, CaseRecordsApi, Collaborators, Playback, SpeechRecognizer, SpeechSynthesizer,
    Translator,
};
pub use conversation::{ConversationConfig, SessionOutcome, SessionTrigger};
pub use engine::{EngineConfig, KioskEngine};
pub use error::{CourtDeskError, Result};
pub use ipc::events::{
    DialogEvent, DialogEventKind, EngineStatus, EngineStatusEvent, SessionState,
    SessionStatusEvent,
};
pub use language::Language;
