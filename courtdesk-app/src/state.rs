//! Operator console state.
//!
//! One `AppState` is shared by the stdin command loop and the event
//! forwarding tasks.

use std::path::PathBuf;
use std::sync::Arc;

use courtdesk_core::activity::ActivitySnapshot;
use courtdesk_core::ipc::events::{EngineStatus, SessionState};
use courtdesk_core::KioskEngine;
use crossbeam_channel::Sender;
use serde::Serialize;

use crate::auth::CloseFlow;
use crate::settings::KioskSettings;

pub struct AppState {
    pub engine: Arc<KioskEngine>,
    /// Feeds the console recognizer; every `say` line lands here.
    pub utterances: Sender<String>,
    /// Password prompt guarding shutdown.
    pub close: CloseFlow,
    pub settings: KioskSettings,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
}

impl AppState {
    pub fn new(
        engine: Arc<KioskEngine>,
        utterances: Sender<String>,
        close: CloseFlow,
        settings: KioskSettings,
        settings_path: PathBuf,
    ) -> Self {
        Self {
            engine,
            utterances,
            close,
            settings,
            settings_path,
        }
    }

    pub fn status_report(&self) -> StatusReport {
        let last = self.engine.last_outcome();
        StatusReport {
            engine: self.engine.status(),
            busy: self.engine.is_busy(),
            close_prompt_open: self.close.is_open(),
            api_base_url: self.settings.api_base_url.clone(),
            resets: self.engine.guard().reset_count(),
            activity: self.engine.guard().snapshot(),
            last_session: last.as_ref().map(|o| o.session.id),
            last_terminal: last.as_ref().map(|o| o.terminal),
            last_endpoint: last
                .as_ref()
                .and_then(|o| o.session.query)
                .map(|q| q.endpoint()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub engine: EngineStatus,
    pub busy: bool,
    pub close_prompt_open: bool,
    pub api_base_url: String,
    pub resets: u64,
    pub activity: ActivitySnapshot,
    pub last_session: Option<u64>,
    pub last_terminal: Option<SessionState>,
    pub last_endpoint: Option<&'static str>,
}
