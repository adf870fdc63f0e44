//! Boundary contracts for the external collaborators.
//!
//! The core never talks to a microphone, speaker, translation API or HTTP
//! server directly. Hosts provide implementations of these traits; the
//! scripted versions in [`stub`] drive the tests.
//!
//! Every blocking call receives a [`CancelToken`] so implementations can stop
//! at their own poll points. A recognizer that cannot be interrupted simply
//! ignores it; the orchestrator re-checks the token after the call returns.

pub mod stub;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::activity::CancelToken;
use crate::error::Result;
use crate::language::Language;

/// Texts longer than this are translated but never cached.
pub const TRANSLATION_CACHE_MAX_CHARS: usize = 4000;

/// Cached translations kept before the oldest one is evicted.
pub const TRANSLATION_CACHE_CAPACITY: usize = 512;

/// Speech-to-text.
pub trait SpeechRecognizer: Send + Sync {
    /// Capture one utterance and return its text.
    ///
    /// # Errors
    /// `Unrecognized` when nothing usable was heard, `RecognitionTimeout`
    /// when no speech started within `timeout`, `RecognitionService` for
    /// provider failures, `Cancelled` when `cancel` fired mid-capture.
    fn recognize(&self, language: Language, timeout: Duration, cancel: &CancelToken)
        -> Result<String>;
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Completed,
    /// `cancel` fired between two words.
    Interrupted,
}

/// Text-to-speech plus audio playback.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` and block until playback finishes or `cancel` fires.
    /// Implementations check `cancel` at every word boundary.
    fn speak(&self, text: &str, language: Language, cancel: &CancelToken) -> Result<Playback>;
}

/// Machine translation.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, source: Language, target: Language) -> Result<String>;
}

/// Reply of the case-records backend. The core only looks at `status` and
/// whether `data` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    pub status: u16,
    #[serde(default)]
    pub data: Value,
}

impl ApiReply {
    pub fn ok(data: Value) -> Self {
        Self { status: 200, data }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// `null`, `{}`, `[]` and `""` count as no data.
    pub fn has_data(&self) -> bool {
        match &self.data {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Case-records HTTP API.
pub trait CaseRecordsApi: Send + Sync {
    /// # Errors
    /// `Transport` when the request could not be completed at all. Any HTTP
    /// reply, including non-200 ones, is `Ok`.
    fn post(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Result<ApiReply>;
}

// Shared handles delegate, so hosts and tests can keep an `Arc` to inspect.

impl<T: SpeechRecognizer + ?Sized> SpeechRecognizer for Arc<T> {
    fn recognize(
        &self,
        language: Language,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<String> {
        (**self).recognize(language, timeout, cancel)
    }
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Arc<T> {
    fn speak(&self, text: &str, language: Language, cancel: &CancelToken) -> Result<Playback> {
        (**self).speak(text, language, cancel)
    }
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        (**self).translate(text, source, target)
    }
}

impl<T: CaseRecordsApi + ?Sized> CaseRecordsApi for Arc<T> {
    fn post(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Result<ApiReply> {
        (**self).post(endpoint, params)
    }
}

/// The four collaborators one orchestrator needs, shared behind `Arc`s.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub translator: Arc<dyn Translator>,
    pub records: Arc<dyn CaseRecordsApi>,
}

impl Collaborators {
    /// Bundle the collaborators, wrapping `translator` in a [`CachingTranslator`].
    pub fn new<R, S, T, A>(recognizer: R, synthesizer: S, translator: T, records: A) -> Self
    where
        R: SpeechRecognizer + 'static,
        S: SpeechSynthesizer + 'static,
        T: Translator + 'static,
        A: CaseRecordsApi + 'static,
    {
        Self {
            recognizer: Arc::new(recognizer),
            synthesizer: Arc::new(synthesizer),
            translator: Arc::new(CachingTranslator::new(translator)),
            records: Arc::new(records),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

type CacheKey = (Language, Language, String);

#[derive(Default)]
struct TranslationCache {
    entries: HashMap<CacheKey, String>,
    /// Insertion order, oldest first.
    order: VecDeque<CacheKey>,
}

/// Memoizes translations by `(source, target, text)`, keeping at most
/// `capacity` entries. The oldest entry is evicted first.
pub struct CachingTranslator<T> {
    inner: T,
    capacity: usize,
    cache: Mutex<TranslationCache>,
}

impl<T: Translator> CachingTranslator<T> {
    pub fn new(inner: T) -> Self {
        Self::with_capacity(inner, TRANSLATION_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            cache: Mutex::new(TranslationCache::default()),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().entries.len()
    }

    fn remember(&self, key: CacheKey, translated: String) {
        if self.capacity == 0 {
            return;
        }
        let mut cache = self.cache.lock();
        if cache.entries.contains_key(&key) {
            return;
        }
        while cache.entries.len() >= self.capacity {
            let Some(oldest) = cache.order.pop_front() else {
                break;
            };
            cache.entries.remove(&oldest);
        }
        cache.order.push_back(key.clone());
        cache.entries.insert(key, translated);
    }
}

impl<T: Translator> Translator for CachingTranslator<T> {
    fn translate(&self, text: &str, source: Language, target: Language) -> Result<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let key = (source, target, text.to_string());
        if let Some(hit) = self.cache.lock().entries.get(&key) {
            return Ok(hit.clone());
        }

        let translated = self.inner.translate(text, source, target)?;
        if text.chars().count() <= TRANSLATION_CACHE_MAX_CHARS {
            self.remember(key, translated.clone());
        } else {
            debug!(chars = text.chars().count(), "translation too long to cache");
        }
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTranslator(AtomicUsize);

    impl Translator for CountingTranslator {
        fn translate(&self, text: &str, _source: Language, target: Language) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{}] {text}", target.code()))
        }
    }

    #[test]
    fn identity_when_languages_match() {
        let t = CachingTranslator::new(CountingTranslator(AtomicUsize::new(0)));
        let out = t.translate("hello", Language::En, Language::En).expect("translate");
        assert_eq!(out, "hello");
        assert_eq!(t.inner.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_text_hits_the_cache() {
        let t = CachingTranslator::new(CountingTranslator(AtomicUsize::new(0)));
        for _ in 0..3 {
            let out = t.translate("hello", Language::En, Language::Hi).expect("translate");
            assert_eq!(out, "[hi] hello");
        }
        assert_eq!(t.inner.0.load(Ordering::SeqCst), 1);
        assert_eq!(t.cached_entries(), 1);
    }

    #[test]
    fn long_texts_are_not_cached() {
        let t = CachingTranslator::new(CountingTranslator(AtomicUsize::new(0)));
        let long = "a".repeat(TRANSLATION_CACHE_MAX_CHARS + 1);
        t.translate(&long, Language::En, Language::Pa).expect("translate");
        t.translate(&long, Language::En, Language::Pa).expect("translate");
        assert_eq!(t.inner.0.load(Ordering::SeqCst), 2);
        assert_eq!(t.cached_entries(), 0);
    }

    #[test]
    fn cache_is_bounded_and_evicts_oldest_first() {
        let t = CachingTranslator::with_capacity(CountingTranslator(AtomicUsize::new(0)), 8);
        for n in 0..100 {
            let narration = format!("Case Details\n\nCase Number: {n}");
            t.translate(&narration, Language::En, Language::Hi).expect("translate");
            assert!(t.cached_entries() <= 8);
        }
        assert_eq!(t.cached_entries(), 8);

        // The newest text is still cached, the first one was evicted.
        t.translate("Case Details\n\nCase Number: 99", Language::En, Language::Hi)
            .expect("translate");
        assert_eq!(t.inner.0.load(Ordering::SeqCst), 100);
        t.translate("Case Details\n\nCase Number: 0", Language::En, Language::Hi)
            .expect("translate");
        assert_eq!(t.inner.0.load(Ordering::SeqCst), 101);
    }

    #[test]
    fn default_capacity_caps_a_long_running_kiosk() {
        let t = CachingTranslator::new(CountingTranslator(AtomicUsize::new(0)));
        for n in 0..(TRANSLATION_CACHE_CAPACITY * 3) {
            t.translate(&format!("Case Number: {n}"), Language::En, Language::Pa)
                .expect("translate");
        }
        assert_eq!(t.cached_entries(), TRANSLATION_CACHE_CAPACITY);
    }

    #[test]
    fn empty_payloads_have_no_data() {
        assert!(!ApiReply::ok(json!(null)).has_data());
        assert!(!ApiReply::ok(json!({})).has_data());
        assert!(!ApiReply::ok(json!([])).has_data());
        assert!(ApiReply::ok(json!({"case_no": "1"})).has_data());
        assert!(!ApiReply { status: 404, data: json!({}) }.is_success());
    }

    #[test]
    fn reply_deserializes_without_data() {
        let reply: ApiReply = serde_json::from_str(r#"{"status":404}"#).expect("parse reply");
        assert_eq!(reply.status, 404);
        assert!(!reply.has_data());
    }
}
