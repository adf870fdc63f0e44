//! Console stand-ins for the speech and translation providers.
//!
//! The operator plays the visitor: prompts are printed instead of spoken,
//! and `say <text>` lines typed on stdin are what the kiosk "hears".

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use courtdesk_core::activity::CancelToken;
use courtdesk_core::{
    CourtDeskError, Language, Playback, SpeechRecognizer, SpeechSynthesizer, Translator,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// How often a waiting recognizer re-checks its cancel token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Prints prompts one line per utterance.
pub struct ConsoleSynthesizer<W: Write + Send> {
    out: Mutex<W>,
    word_delay: Duration,
}

impl ConsoleSynthesizer<std::io::Stdout> {
    pub fn stdout(word_delay: Duration) -> Self {
        Self::new(std::io::stdout(), word_delay)
    }
}

impl<W: Write + Send> ConsoleSynthesizer<W> {
    pub fn new(out: W, word_delay: Duration) -> Self {
        Self {
            out: Mutex::new(out),
            word_delay,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> SpeechSynthesizer for ConsoleSynthesizer<W> {
    fn speak(
        &self,
        text: &str,
        language: Language,
        cancel: &CancelToken,
    ) -> courtdesk_core::Result<Playback> {
        let mut played = Vec::new();
        let mut outcome = Playback::Completed;
        for word in text.split_whitespace() {
            let stopped = if self.word_delay.is_zero() {
                cancel.stop_reason()
            } else {
                cancel.wait(self.word_delay)
            };
            if let Some(reason) = stopped {
                debug!(?reason, "playback interrupted");
                outcome = Playback::Interrupted;
                break;
            }
            played.push(word);
        }

        let mut out = self.out.lock();
        let line = match outcome {
            Playback::Completed => format!("kiosk[{language}]> {text}"),
            Playback::Interrupted => format!("kiosk[{language}]> {} ...", played.join(" ")),
        };
        writeln!(out, "{line}").map_err(|e| CourtDeskError::Playback(e.to_string()))?;
        out.flush()
            .map_err(|e| CourtDeskError::Playback(e.to_string()))?;
        Ok(outcome)
    }
}

/// Hears whatever the operator queues with `say`. Utterances typed ahead are
/// consumed in order.
pub struct OperatorRecognizer {
    rx: Receiver<String>,
}

impl OperatorRecognizer {
    pub fn channel() -> (Sender<String>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self { rx })
    }
}

impl SpeechRecognizer for OperatorRecognizer {
    fn recognize(
        &self,
        _language: Language,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> courtdesk_core::Result<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(CourtDeskError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CourtDeskError::RecognitionTimeout(timeout));
            }
            match self.rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(text) => {
                    let text = text.trim().to_string();
                    return if text.is_empty() {
                        Err(CourtDeskError::Unrecognized)
                    } else {
                        Ok(text)
                    };
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CourtDeskError::RecognitionService(
                        "operator input closed".into(),
                    ))
                }
            }
        }
    }
}

/// Fixed prompt translations keyed by target language code, then by the
/// English source text.
#[derive(Debug, Default, Clone)]
pub struct PhrasebookTranslator {
    entries: HashMap<String, HashMap<String, String>>,
}

impl PhrasebookTranslator {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        Ok(Self {
            entries: serde_json::from_str(raw)?,
        })
    }

    /// A missing or malformed phrasebook leaves every prompt in English.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path).map(|raw| Self::from_json(&raw)) {
            Ok(Ok(book)) => book,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "phrasebook is malformed");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "phrasebook not readable");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Translator for PhrasebookTranslator {
    fn translate(
        &self,
        text: &str,
        _source: Language,
        target: Language,
    ) -> courtdesk_core::Result<String> {
        self.entries
            .get(target.code())
            .and_then(|book| book.get(text))
            .cloned()
            .ok_or_else(|| {
                CourtDeskError::Translation(format!("no {target} phrasebook entry for {text:?}"))
            })
    }
}
