//! Operator authentication and the password-protected Close flow.
//!
//! The auth list is a JSON array of single-entry maps, `[{"admin": "1234"}]`.
//! A secret is either the plain PIN or `sha256:<hex digest of the PIN>`.
//!
//! While the Close prompt is open the kiosk is reset after 30 s of silence,
//! and after 10 s once a digit has been entered. Any `reset_all` closes the
//! prompt.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use courtdesk_core::activity::{ActivityGuard, IdleWindow};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct AuthList {
    entries: Vec<BTreeMap<String, String>>,
}

impl AuthList {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        Ok(Self {
            entries: serde_json::from_str(raw)?,
        })
    }

    /// A missing or malformed file yields an empty list; nobody can close
    /// the kiosk until it is fixed.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "auth list is malformed");
                Self::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "auth list not readable");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The user whose secret matches `password`.
    pub fn verify(&self, password: &str) -> Option<&str> {
        if password.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .flat_map(|entry| entry.iter())
            .find(|(_, secret)| secret_matches(secret, password))
            .map(|(user, _)| user.as_str())
    }
}

fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn secret_matches(secret: &str, password: &str) -> bool {
    match secret.strip_prefix("sha256:") {
        Some(digest) => digest.trim().eq_ignore_ascii_case(&sha256_hex(password)),
        None => secret == password,
    }
}

/// Result of submitting the Close prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAttempt {
    /// The kiosk may shut down.
    Accepted { user: String },
    Rejected,
    Empty,
    /// No prompt was open.
    NotOpen,
}

/// State of the Close password prompt.
pub struct CloseFlow {
    guard: ActivityGuard,
    auth: AuthList,
    /// `Some(entered digits)` while the prompt is open.
    entry: Arc<Mutex<Option<String>>>,
}

impl CloseFlow {
    pub fn new(guard: ActivityGuard, auth: AuthList) -> Self {
        let entry: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let on_reset = Arc::clone(&entry);
        guard.on_reset(move |cause| {
            if on_reset.lock().take().is_some() {
                info!(?cause, "close prompt dismissed by reset");
            }
        });
        Self { guard, auth, entry }
    }

    pub fn open(&self) {
        *self.entry.lock() = Some(String::new());
        self.guard.touch_window(IdleWindow::ClosePrompt);
        info!("close prompt opened");
    }

    pub fn is_open(&self) -> bool {
        self.entry.lock().is_some()
    }

    /// Entered digit count, for a masked display.
    pub fn entered_len(&self) -> usize {
        self.entry.lock().as_ref().map_or(0, |e| e.chars().count())
    }

    /// A keypad press on the prompt. `⌫` or `<` deletes the last digit.
    pub fn key(&self, key: char) -> bool {
        let mut entry = self.entry.lock();
        let Some(entry) = entry.as_mut() else {
            return false;
        };
        match key {
            '⌫' | '<' => {
                entry.pop();
            }
            c if c.is_ascii_digit() => entry.push(c),
            _ => return false,
        }
        self.guard.touch_window(IdleWindow::PasswordEntry);
        true
    }

    pub fn cancel(&self) {
        if self.entry.lock().take().is_some() {
            self.guard.touch_window(IdleWindow::Conversation);
            info!("close prompt cancelled");
        }
    }

    /// Verify the entered PIN. A wrong PIN clears the entry and keeps the
    /// prompt open.
    pub fn submit(&self) -> CloseAttempt {
        let mut slot = self.entry.lock();
        let Some(entry) = slot.as_mut() else {
            return CloseAttempt::NotOpen;
        };
        self.guard.touch_window(IdleWindow::PasswordEntry);
        if entry.is_empty() {
            return CloseAttempt::Empty;
        }
        match self.auth.verify(entry) {
            Some(user) => {
                info!(%user, "close authorised");
                let user = user.to_string();
                *slot = None;
                CloseAttempt::Accepted { user }
            }
            None => {
                warn!("incorrect close password");
                entry.clear();
                CloseAttempt::Rejected
            }
        }
    }
}
