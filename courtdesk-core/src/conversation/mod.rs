//! The dialogue state machine that drives one visitor session.
//!
//! ## Pipeline
//!
//! ```text
//! Idle ─► AwaitingLanguage ─► AwaitingEstablishment ─► AwaitingCategory
//!      ─► CapturingField* ─► Dispatching ─► PlayingResult ─► Completed ─► Idle
//! ```
//!
//! Every non-idle state can exit to `Cancelled` (stop, reset, watchdog) or
//! `Failed` (a step ran out of attempts, the backend was unreachable). Each
//! terminal state returns to `Idle` after the activity flags and the button
//! latch are cleared.
//!
//! `run_session` blocks the calling thread for the whole conversation.

pub mod catalog;
pub mod dispatch;
pub mod greeting;
pub mod session;

pub use catalog::{CaseSearchKind, Establishment, Query, SearchCategory};
pub use dispatch::QueryResult;
pub use session::{CapturedFields, Session, SessionState};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, info_span, warn};

use crate::activity::{ActivityGuard, CancelToken, IdleWindow, PauseFlag, StopReason};
use crate::channel::{ButtonChannel, ButtonLatch, VoiceChannel};
use crate::collab::{CaseRecordsApi, Collaborators};
use crate::dialog::{DialogContext, DialogStep, Menu, StepOutcome, DEFAULT_MAX_ATTEMPTS};
use crate::ipc::events::SessionStatusEvent;
use crate::ipc::DialogEventBus;
use crate::language::Language;
use crate::normalize::{default_case_types, CaseTypeEntry, DEFAULT_SIMILARITY_FLOOR};
use catalog::{FieldPolicy, CASE_SEARCH_MENU, CATEGORY_MENU, ESTABLISHMENT_MENU, LANGUAGE_MENU};

/// Dialogue policy.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Attempts per question. Default: 3.
    pub max_attempts: u32,
    /// Recognition timeout per attempt. Default: 7 s.
    pub listen_timeout: Duration,
    /// Recognition timeout for CNR identifiers. Default: 10 s.
    pub identifier_listen_timeout: Duration,
    /// Language used until the visitor chooses one. Default: Punjabi.
    pub default_language: Language,
    /// Nearest-neighbour floor for case types. Default: 0.7.
    pub similarity_floor: f64,
    pub case_types: Vec<CaseTypeEntry>,
    /// Continue in `default_language` when the language step fails instead
    /// of ending the session. Default: false.
    pub fallback_to_default_language: bool,
    /// Open the language prompt with the time-of-day greeting. Default: true.
    pub greet: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            listen_timeout: Duration::from_secs(7),
            identifier_listen_timeout: Duration::from_secs(10),
            default_language: Language::default(),
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            case_types: default_case_types(),
            fallback_to_default_language: false,
            greet: true,
        }
    }
}

/// What started a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTrigger {
    /// The presence sensor confirmed a visitor; ask for the language.
    Presence,
    /// A language button was pressed; the language is already known.
    LanguageButton(Language),
}

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session: Session,
    /// `Completed`, `Failed` or `Cancelled`.
    pub terminal: SessionState,
    pub result: Option<QueryResult>,
}

/// Why the pipeline stopped early.
enum Halt {
    Cancelled(StopReason),
    Failed(String),
}

type Flow<T> = std::result::Result<T, Halt>;

pub struct ConversationOrchestrator {
    config: ConversationConfig,
    guard: ActivityGuard,
    latch: ButtonLatch,
    voice: VoiceChannel,
    button: ButtonChannel,
    records: Arc<dyn CaseRecordsApi>,
    events: DialogEventBus,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    next_id: AtomicU64,
}

impl ConversationOrchestrator {
    pub fn new(
        config: ConversationConfig,
        guard: ActivityGuard,
        latch: ButtonLatch,
        collab: Collaborators,
        events: DialogEventBus,
        status_tx: broadcast::Sender<SessionStatusEvent>,
    ) -> Self {
        let records = Arc::clone(&collab.records);
        let voice = VoiceChannel::new(collab, guard.clone(), latch.clone(), events.clone());
        let button = ButtonChannel::new(latch.clone());
        Self {
            config,
            guard,
            latch,
            voice,
            button,
            records,
            events,
            status_tx,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Run one conversation to its end. Never panics on collaborator errors;
    /// every failure ends in a terminal state.
    pub fn run_session(&self, trigger: SessionTrigger) -> SessionOutcome {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("session", id);
        let _entered = span.enter();

        self.guard.clear_flags();
        self.guard.set_flag(PauseFlag::Camera, true);
        self.guard.touch_window(IdleWindow::Conversation);
        let cancel = self.guard.cancel_token(None);

        let mut session = Session::new(id, self.config.default_language);
        info!(?trigger, "session started");

        let mut result = None;
        let terminal = match self.drive(&mut session, trigger, &cancel, &mut result) {
            Ok(terminal) => terminal,
            Err(Halt::Cancelled(reason)) => {
                info!(?reason, "session cancelled");
                SessionState::Cancelled
            }
            Err(Halt::Failed(why)) => {
                warn!(%why, "session failed");
                self.set_state(&mut session, SessionState::Failed, Some(why));
                self.finish(&mut session);
                return SessionOutcome {
                    session,
                    terminal: SessionState::Failed,
                    result,
                };
            }
        };

        self.set_state(&mut session, terminal, None);
        self.finish(&mut session);
        SessionOutcome {
            session,
            terminal,
            result,
        }
    }

    fn drive(
        &self,
        session: &mut Session,
        trigger: SessionTrigger,
        cancel: &CancelToken,
        result: &mut Option<QueryResult>,
    ) -> Flow<SessionState> {
        self.set_state(session, SessionState::AwaitingLanguage, None);
        session.language = match trigger {
            SessionTrigger::LanguageButton(language) => language,
            SessionTrigger::Presence => self.select_language(session, cancel)?,
        };
        info!(language = %session.language, "language selected");

        self.set_state(session, SessionState::AwaitingEstablishment, None);
        let establishment = self.run_menu(
            session,
            cancel,
            ESTABLISHMENT_MENU,
            ESTABLISHMENT_MENU
                .step("establishment", "Kindly select a court establishment.")
                .retry_message("No valid court establishment type recognized. Please try again.")
                .failure_message("Failed to detect valid court type after 3 attempts."),
        )?;
        session.establishment = Some(establishment);

        self.set_state(session, SessionState::AwaitingCategory, None);
        let category = self.run_menu(
            session,
            cancel,
            CATEGORY_MENU,
            CATEGORY_MENU
                .step("category", "What kind of search you want to make.")
                .retry_message("No valid search type recognized. Please try again.")
                .failure_message("Failed to detect valid search type after 3 attempts."),
        )?;
        session.category = Some(category);

        let query = match catalog::Query::for_category(category) {
            Some(query) => query,
            None => {
                self.set_state(session, SessionState::CapturingField, Some("caseSearchKind".into()));
                let kind = self.run_menu(
                    session,
                    cancel,
                    CASE_SEARCH_MENU,
                    CASE_SEARCH_MENU
                        .step("case_search_kind", "Please select a case search type.")
                        .retry_message("No valid case search type recognized. Please try again.")
                        .failure_message("Failed to detect valid search type after 3 attempts."),
                )?;
                session.case_search = Some(kind);
                Query::for_case_search(kind)
            }
        };
        session.query = Some(query);
        info!(?query, "query selected");

        self.capture_fields(session, query, cancel)?;

        self.set_state(session, SessionState::Dispatching, Some(query.endpoint().into()));
        let outcome = self.dispatch(session, query, cancel);
        let terminal = match &outcome {
            QueryResult::Found { .. } | QueryResult::NotFound { .. } => SessionState::Completed,
            QueryResult::Unavailable { .. } => SessionState::Failed,
        };

        self.set_state(session, SessionState::PlayingResult, None);
        let spoken = outcome.spoken_text(query).to_string();
        *result = Some(outcome);
        if let Some(reason) = self.voice.narrate(&spoken, session.language, cancel) {
            return Err(Halt::Cancelled(reason));
        }
        Ok(terminal)
    }

    fn select_language(&self, session: &Session, cancel: &CancelToken) -> Flow<Language> {
        let header = if self.config.greet {
            format!(
                "{}. Kindly select a language. I could understand three languages.",
                greeting::greeting()
            )
        } else {
            "Kindly select a language. I could understand three languages.".to_string()
        };
        let step = LANGUAGE_MENU
            .step("language", &header)
            .max_attempts(self.config.max_attempts)
            .listen_timeout(self.config.listen_timeout)
            .retry_message("No valid language type recognized. Please try again.")
            .failure_message("Failed to detect valid language type after many attempts.");

        match step.run(&self.dialog(session.language, cancel)) {
            StepOutcome::Answered(language) => {
                self.confirm(LANGUAGE_MENU.label_of(language), language, cancel)?;
                Ok(language)
            }
            StepOutcome::Cancelled(reason) => Err(Halt::Cancelled(reason)),
            StepOutcome::Failed if self.config.fallback_to_default_language => {
                let language = self.config.default_language;
                warn!(%language, "language step failed, continuing with default");
                self.say(
                    "So I am continuing with the default language.",
                    session.language,
                    cancel,
                )?;
                Ok(language)
            }
            StepOutcome::Failed => Err(Halt::Failed("no language selected".into())),
        }
    }

    fn run_menu<T>(
        &self,
        session: &Session,
        cancel: &CancelToken,
        menu: Menu<T>,
        step: DialogStep<T>,
    ) -> Flow<T>
    where
        T: Copy + PartialEq + Send + Sync + 'static,
    {
        let step = step
            .max_attempts(self.config.max_attempts)
            .listen_timeout(self.config.listen_timeout);
        match step.run(&self.dialog(session.language, cancel)) {
            StepOutcome::Answered(value) => {
                self.confirm(menu.label_of(value), session.language, cancel)?;
                Ok(value)
            }
            StepOutcome::Cancelled(reason) => Err(Halt::Cancelled(reason)),
            StepOutcome::Failed => Err(Halt::Failed(format!("no valid {}", step.name()))),
        }
    }

    fn capture_fields(&self, session: &mut Session, query: Query, cancel: &CancelToken) -> Flow<()> {
        let policy = FieldPolicy {
            max_attempts: self.config.max_attempts,
            listen_timeout: self.config.listen_timeout,
            identifier_listen_timeout: self.config.identifier_listen_timeout,
            similarity_floor: self.config.similarity_floor,
        };
        for field in query.fields() {
            self.set_state(session, SessionState::CapturingField, Some(field.key.into()));
            let step = field.step(&policy, self.config.case_types.clone());
            match step.run(&self.dialog(session.language, cancel)) {
                StepOutcome::Answered(value) => {
                    info!(field = field.key, %value, "field captured");
                    session.fields.insert(field.key, value);
                }
                StepOutcome::Cancelled(reason) => return Err(Halt::Cancelled(reason)),
                StepOutcome::Failed => return Err(Halt::Failed(format!("{} not captured", field.key))),
            }
        }
        Ok(())
    }

    fn dispatch(&self, session: &Session, query: Query, cancel: &CancelToken) -> QueryResult {
        let endpoint = query.endpoint();
        let Some(params) = dispatch::build_request(query, session) else {
            warn!(%endpoint, "captured fields do not form a valid request");
            return QueryResult::NotFound { status: 0 };
        };
        let reply = self.records.post(endpoint, &params);
        if !cancel.is_cancelled() {
            self.guard.touch_window(IdleWindow::Conversation);
        }
        let outcome = dispatch::classify(reply);
        match &outcome {
            QueryResult::Found { .. } => info!(%endpoint, "records found"),
            QueryResult::NotFound { status } => info!(%endpoint, status, "no records"),
            QueryResult::Unavailable { error } => warn!(%endpoint, %error, "records backend unavailable"),
        }
        outcome
    }

    /// "Ok you have selected X." A key press may cut it short; the key then
    /// answers the next question.
    fn confirm(&self, label: Option<&str>, language: Language, cancel: &CancelToken) -> Flow<()> {
        let Some(label) = label else { return Ok(()) };
        match self
            .voice
            .say(&format!("Ok you have selected {label}."), language, cancel, true)
        {
            Some(reason) if reason.ends_session() => Err(Halt::Cancelled(reason)),
            _ => Ok(()),
        }
    }

    fn say(&self, text: &str, language: Language, cancel: &CancelToken) -> Flow<()> {
        match self.voice.say(text, language, cancel, false) {
            Some(reason) => Err(Halt::Cancelled(reason)),
            None => Ok(()),
        }
    }

    fn dialog<'a>(&'a self, language: Language, cancel: &'a CancelToken) -> DialogContext<'a> {
        DialogContext {
            voice: &self.voice,
            button: &self.button,
            events: &self.events,
            language,
            cancel,
            listen_timeout: self.config.listen_timeout,
        }
    }

    /// Clean slate for the next session, however this one ended.
    fn finish(&self, session: &mut Session) {
        self.guard.clear_flags();
        self.latch.clear_latch();
        self.set_state(session, SessionState::Idle, None);
        info!("session finished");
    }

    fn set_state(&self, session: &mut Session, state: SessionState, detail: Option<String>) {
        info!(from = ?session.state, to = ?state, detail = detail.as_deref().unwrap_or(""), "session state");
        session.state = state;
        let _ = self.status_tx.send(SessionStatusEvent {
            session_id: session.id,
            state,
            detail,
        });
    }
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::stub::{
        CannedCaseRecords, Heard, IdentityTranslator, RecordingSynthesizer, ScriptedRecognizer,
    };
    use crate::collab::ApiReply;
    use serde_json::json;

    struct Rig {
        guard: ActivityGuard,
        latch: ButtonLatch,
        recognizer: Arc<ScriptedRecognizer>,
        tts: Arc<RecordingSynthesizer>,
        records: Arc<CannedCaseRecords>,
        orchestrator: ConversationOrchestrator,
        status_rx: broadcast::Receiver<SessionStatusEvent>,
    }

    fn rig(script: Vec<Heard>, records: CannedCaseRecords, config: ConversationConfig) -> Rig {
        let guard = ActivityGuard::default();
        let latch = ButtonLatch::new(guard.clone());
        let recognizer = Arc::new(ScriptedRecognizer::new(script));
        let tts = Arc::new(RecordingSynthesizer::new());
        let records = Arc::new(records);
        let collab = Collaborators::new(
            Arc::clone(&recognizer),
            Arc::clone(&tts),
            IdentityTranslator,
            Arc::clone(&records),
        );
        let (status_tx, status_rx) = broadcast::channel(64);
        let orchestrator = ConversationOrchestrator::new(
            config,
            guard.clone(),
            latch.clone(),
            collab,
            DialogEventBus::new(),
            status_tx,
        );
        Rig {
            guard,
            latch,
            recognizer,
            tts,
            records,
            orchestrator,
            status_rx,
        }
    }

    fn quiet() -> ConversationConfig {
        ConversationConfig {
            greet: false,
            ..ConversationConfig::default()
        }
    }

    #[test]
    fn advocate_search_completes() {
        let records = CannedCaseRecords::new()
            .with_reply("advocate", ApiReply::ok(json!([{"case_no": "CRM-M-1"}])));
        let r = rig(
            vec![
                Heard::text("civil"),
                Heard::text("advocate"),
                Heard::text("rajesh kumar"),
                Heard::text("pending"),
            ],
            records,
            quiet(),
        );
        let outcome = r
            .orchestrator
            .run_session(SessionTrigger::LanguageButton(Language::En));
        assert_eq!(outcome.terminal, SessionState::Completed);
        assert_eq!(outcome.session.state, SessionState::Idle);
        assert_eq!(outcome.session.establishment, Some(Establishment::CivilCourt));

        let requests = r.records.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "advocate");
        assert_eq!(requests[0].1["advocate_name"], "Rajesh Kumar");
        assert_eq!(requests[0].1["status"], "Pending");
        assert!(r.tts.spoken().iter().any(|s| s.starts_with("Case 1 Details")));
        assert!(r.guard.snapshot().is_clear());
    }

    #[test]
    fn failed_language_step_ends_the_session() {
        let r = rig(
            vec![Heard::text("french"), Heard::text("german"), Heard::text("latin")],
            CannedCaseRecords::new(),
            quiet(),
        );
        let outcome = r.orchestrator.run_session(SessionTrigger::Presence);
        assert_eq!(outcome.terminal, SessionState::Failed);
        assert_eq!(r.recognizer.calls(), 3);
        assert!(r.records.requests().is_empty());
    }

    #[test]
    fn language_fallback_continues_in_default_language() {
        let config = ConversationConfig {
            fallback_to_default_language: true,
            ..quiet()
        };
        let r = rig(
            vec![
                Heard::Unrecognized,
                Heard::Unrecognized,
                Heard::Unrecognized,
                Heard::text("ਸਿਵਲ"),
                Heard::text("ਪੈਨਲ"),
            ],
            CannedCaseRecords::new(),
            config,
        );
        let outcome = r.orchestrator.run_session(SessionTrigger::Presence);
        assert_eq!(outcome.session.language, Language::Pa);
        assert_eq!(outcome.session.category, Some(SearchCategory::Panel));
        // The panel plan then runs out of scripted answers.
        assert_eq!(outcome.terminal, SessionState::Failed);
    }

    #[test]
    fn unreachable_backend_fails_after_speaking() {
        let records = CannedCaseRecords::new().with_transport_error("caveat", "connection refused");
        let r = rig(
            vec![
                Heard::text("district"),
                Heard::text("caveat"),
                Heard::text("civil"),
                Heard::text("amar"),
                Heard::text("akbar"),
            ],
            records,
            quiet(),
        );
        let outcome = r
            .orchestrator
            .run_session(SessionTrigger::LanguageButton(Language::Hi));
        assert_eq!(outcome.terminal, SessionState::Failed);
        assert!(matches!(outcome.result, Some(QueryResult::Unavailable { .. })));
        let spoken = r.tts.spoken();
        assert_eq!(
            spoken.last().map(String::as_str),
            Some(Query::Caveat.unavailable_message())
        );
    }

    #[test]
    fn confirmation_follows_each_menu() {
        let r = rig(vec![Heard::text("criminal")], CannedCaseRecords::new(), quiet());
        r.latch.press('9');
        let _ = r
            .orchestrator
            .run_session(SessionTrigger::LanguageButton(Language::En));
        let spoken = r.tts.spoken();
        assert!(spoken.contains(&"Ok you have selected Criminal Court Sangrur.".to_string()));
    }

    #[test]
    fn status_events_trace_the_pipeline() {
        let mut r = rig(vec![], CannedCaseRecords::new(), quiet());
        let _ = r
            .orchestrator
            .run_session(SessionTrigger::LanguageButton(Language::En));
        let mut states = Vec::new();
        while let Ok(event) = r.status_rx.try_recv() {
            states.push(event.state);
        }
        assert_eq!(
            states,
            [
                SessionState::AwaitingLanguage,
                SessionState::AwaitingEstablishment,
                SessionState::Failed,
                SessionState::Idle
            ]
        );
    }
}
