//! Event types and the broadcast bus hosts subscribe to.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them as JSON unchanged.

pub mod events;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;

use crate::language::Language;
use events::{DialogEvent, DialogEventKind};

/// Broadcast channel capacity for every event stream.
pub const BROADCAST_CAP: usize = 256;

/// Sequenced broadcast sender for [`DialogEvent`]s.
#[derive(Debug, Clone)]
pub struct DialogEventBus {
    tx: broadcast::Sender<DialogEvent>,
    seq: Arc<AtomicU64>,
}

impl DialogEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Send to current subscribers. Having none is not an error.
    pub fn emit(&self, kind: DialogEventKind, text: &str, language: Language) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.tx.send(DialogEvent {
            seq,
            kind,
            text: text.to_string(),
            language,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialogEvent> {
        self.tx.subscribe()
    }
}

impl Default for DialogEventBus {
    fn default() -> Self {
        Self::new()
    }
}
