//! Scripted collaborators for development hosts and tests.
//!
//! They let the full orchestrator run end-to-end without audio hardware or
//! network access, and record what was asked of them so tests can assert on
//! prompts, captures and requests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::activity::CancelToken;
use crate::collab::{
    ApiReply, CaseRecordsApi, Playback, SpeechRecognizer, SpeechSynthesizer, Translator,
};
use crate::error::{CourtDeskError, Result};
use crate::language::Language;

/// One scripted recognition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    Text(String),
    Unrecognized,
    ServiceError(String),
    /// Block until the token is cancelled or the timeout passes.
    WaitForCancel,
}

impl Heard {
    pub fn text(text: impl Into<String>) -> Self {
        Heard::Text(text.into())
    }
}

/// Returns scripted utterances in order. An exhausted script behaves like a
/// recognizer that heard nothing.
#[derive(Default)]
pub struct ScriptedRecognizer {
    script: Mutex<VecDeque<Heard>>,
    calls: AtomicUsize,
    timeouts: Mutex<Vec<Duration>>,
}

impl ScriptedRecognizer {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Heard>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn push(&self, heard: Heard) {
        self.script.lock().push_back(heard);
    }

    /// Number of `recognize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The timeout passed to every call, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn recognize(
        &self,
        language: Language,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeouts.lock().push(timeout);
        let next = self.script.lock().pop_front();
        debug!(%language, ?next, "scripted recognition");
        match next {
            Some(Heard::Text(text)) => Ok(text),
            Some(Heard::Unrecognized) | None => Err(CourtDeskError::Unrecognized),
            Some(Heard::ServiceError(msg)) => Err(CourtDeskError::RecognitionService(msg)),
            Some(Heard::WaitForCancel) => match cancel.wait(timeout) {
                Some(_) => Err(CourtDeskError::Cancelled),
                None => Err(CourtDeskError::RecognitionTimeout(timeout)),
            },
        }
    }
}

/// Records every completed utterance instead of playing audio.
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: Mutex<Vec<(String, Language)>>,
    interrupted: AtomicUsize,
    word_delay: Duration,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate playback time: every word takes `delay` and is a cancel point.
    pub fn with_word_delay(delay: Duration) -> Self {
        Self {
            word_delay: delay,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn spoken_with_language(&self) -> Vec<(String, Language)> {
        self.spoken.lock().clone()
    }

    pub fn interrupted(&self) -> usize {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&self, text: &str, language: Language, cancel: &CancelToken) -> Result<Playback> {
        for _ in text.split_whitespace() {
            let stopped = if self.word_delay.is_zero() {
                cancel.stop_reason()
            } else {
                cancel.wait(self.word_delay)
            };
            if stopped.is_some() {
                self.interrupted.fetch_add(1, Ordering::SeqCst);
                return Ok(Playback::Interrupted);
            }
        }
        self.spoken.lock().push((text.to_string(), language));
        Ok(Playback::Completed)
    }
}

/// Returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str, _source: Language, _target: Language) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Fails every call, for exercising the untranslated-text fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTranslator;

impl Translator for FailingTranslator {
    fn translate(&self, _text: &str, _source: Language, target: Language) -> Result<String> {
        Err(CourtDeskError::Translation(format!(
            "no route to translation service for {target}"
        )))
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Reply(ApiReply),
    Unreachable(String),
}

/// Serves canned replies per endpoint and records every request.
/// Unknown endpoints answer 404 with no data.
#[derive(Default)]
pub struct CannedCaseRecords {
    replies: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl CannedCaseRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, endpoint: &str, reply: ApiReply) -> Self {
        self.replies
            .lock()
            .insert(endpoint.to_string(), Canned::Reply(reply));
        self
    }

    pub fn with_transport_error(self, endpoint: &str, message: &str) -> Self {
        self.replies
            .lock()
            .insert(endpoint.to_string(), Canned::Unreachable(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.requests.lock().clone()
    }
}

impl CaseRecordsApi for CannedCaseRecords {
    fn post(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Result<ApiReply> {
        self.requests
            .lock()
            .push((endpoint.to_string(), params.clone()));
        match self.replies.lock().get(endpoint) {
            Some(Canned::Reply(reply)) => Ok(reply.clone()),
            Some(Canned::Unreachable(msg)) => Err(CourtDeskError::Transport(msg.clone())),
            None => Ok(ApiReply {
                status: 404,
                data: serde_json::Value::Null,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityGuard;

    #[test]
    fn recognizer_replays_script_then_reports_unrecognized() {
        let guard = ActivityGuard::default();
        let token = guard.cancel_token(None);
        let rec = ScriptedRecognizer::new([Heard::text("one"), Heard::Unrecognized]);
        let timeout = Duration::from_secs(7);
        assert_eq!(rec.recognize(Language::En, timeout, &token).ok().as_deref(), Some("one"));
        assert!(matches!(
            rec.recognize(Language::En, timeout, &token),
            Err(CourtDeskError::Unrecognized)
        ));
        assert!(matches!(
            rec.recognize(Language::En, timeout, &token),
            Err(CourtDeskError::Unrecognized)
        ));
        assert_eq!(rec.calls(), 3);
    }

    #[test]
    fn wait_for_cancel_times_out_without_stop() {
        let guard = ActivityGuard::default();
        let token = guard.cancel_token(None);
        let rec = ScriptedRecognizer::new([Heard::WaitForCancel]);
        let result = rec.recognize(Language::Pa, Duration::from_millis(30), &token);
        assert!(matches!(result, Err(CourtDeskError::RecognitionTimeout(_))));
    }

    #[test]
    fn synthesizer_skips_recording_when_cancelled() {
        let guard = ActivityGuard::default();
        let token = guard.cancel_token(None);
        let tts = RecordingSynthesizer::new();
        guard.request_stop();
        let playback = tts.speak("hello there", Language::En, &token).expect("speak");
        assert_eq!(playback, Playback::Interrupted);
        assert!(tts.spoken().is_empty());
        assert_eq!(tts.interrupted(), 1);
    }

    #[test]
    fn canned_records_answer_unknown_endpoints_with_404() {
        let api = CannedCaseRecords::new().with_transport_error("cnr", "connection refused");
        let params = BTreeMap::new();
        assert!(matches!(api.post("cnr", &params), Err(CourtDeskError::Transport(_))));
        let reply = api.post("advocate", &params).expect("reply");
        assert_eq!(reply.status, 404);
        assert_eq!(api.requests().len(), 2);
    }
}
