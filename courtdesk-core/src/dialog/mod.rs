//! One question of the conversation.
//!
//! ## Round
//!
//! ```text
//! say(prompt) ─► latched key? ──yes──► validate
//!                   │no
//!                   ▼
//!               listen (key press pre-empts) ─► validate
//!                                                 │invalid
//!                                                 ▼
//!                                     say(retry) and next attempt
//! ```
//!
//! Unusable recognition and invalid answers consume one attempt each, from
//! either channel. On success the latch is cleared so a stale press cannot
//! answer the next question.

pub mod menu;

pub use menu::{Menu, MenuEntry};

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::activity::{CancelToken, StopReason};
use crate::channel::{ButtonChannel, Capture, CaptureRequest, InputChannel, RawAnswer, VoiceChannel};
use crate::ipc::events::DialogEventKind;
use crate::ipc::DialogEventBus;
use crate::language::Language;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const UNHEARD_MESSAGE: &str = "I couldn't understand your input. Please try again.";
pub const INVALID_MESSAGE: &str = "Invalid input. Please try again.";
pub const FAILED_MESSAGE: &str = "Sorry, I could not get a valid answer.";

/// Why an answer was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Logged.
    pub reason: String,
    /// Spoken instead of the step's retry message.
    pub message: Option<String>,
}

impl Rejection {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub type Validator<T> = Box<dyn Fn(&RawAnswer, Language) -> Result<T, Rejection> + Send + Sync>;

/// Result of running a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    Answered(T),
    /// Attempts exhausted.
    Failed,
    Cancelled(StopReason),
}

/// A question with its validator and retry policy.
pub struct DialogStep<T> {
    name: String,
    prompt: String,
    validator: Validator<T>,
    max_attempts: u32,
    accepts_buttons: bool,
    listen_timeout: Option<Duration>,
    retry_message: String,
    failure_message: String,
}

impl<T> DialogStep<T> {
    pub fn new<F>(name: impl Into<String>, prompt: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&RawAnswer, Language) -> Result<T, Rejection> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            validator: Box::new(validator),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            accepts_buttons: true,
            listen_timeout: None,
            retry_message: INVALID_MESSAGE.to_string(),
            failure_message: FAILED_MESSAGE.to_string(),
        }
    }

    /// Ignore the keypad for this step.
    pub fn voice_only(mut self) -> Self {
        self.accepts_buttons = false;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = Some(timeout);
        self
    }

    pub fn retry_message(mut self, message: impl Into<String>) -> Self {
        self.retry_message = message.into();
        self
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn accepts_buttons(&self) -> bool {
        self.accepts_buttons
    }

    pub fn validate(&self, answer: &RawAnswer, language: Language) -> Result<T, Rejection> {
        (self.validator)(answer, language)
    }

    /// Ask the question until a valid answer arrives, attempts run out, or
    /// the session is cancelled.
    ///
    /// The prompt is always spoken first. A key latched before the step
    /// starts is carried into the first round and answers it; a key pressed
    /// while the prompt plays cuts playback short.
    pub fn run(&self, ctx: &DialogContext<'_>) -> StepOutcome<T> {
        let max_attempts = self.max_attempts.max(1);
        let request = CaptureRequest {
            language: ctx.language,
            timeout: self.listen_timeout.unwrap_or(ctx.listen_timeout),
            accepts_buttons: self.accepts_buttons,
        };

        if let Some(reason) = ctx.say(&self.prompt, self.accepts_buttons) {
            return StepOutcome::Cancelled(reason);
        }

        for attempt in 1..=max_attempts {
            let rejection = match ctx.round(&request) {
                Round::Stop(reason) => return StepOutcome::Cancelled(reason),
                Round::Rejected(rejection) => rejection,
                Round::Answer(answer) => match self.validate(&answer, ctx.language) {
                    Ok(value) => {
                        ctx.button.latch().clear_latch();
                        info!(step = %self.name, attempt, "answer accepted");
                        return StepOutcome::Answered(value);
                    }
                    Err(rejection) => rejection,
                },
            };

            warn!(step = %self.name, attempt, reason = %rejection.reason, "answer rejected");
            if attempt < max_attempts {
                let message = rejection.message.as_deref().unwrap_or(&self.retry_message);
                if let Some(reason) = ctx.say(message, self.accepts_buttons) {
                    return StepOutcome::Cancelled(reason);
                }
            }
        }

        warn!(step = %self.name, max_attempts, "attempts exhausted");
        if let Some(reason) = ctx.say(&self.failure_message, false) {
            return StepOutcome::Cancelled(reason);
        }
        StepOutcome::Failed
    }
}

impl<T> std::fmt::Debug for DialogStep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogStep")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("accepts_buttons", &self.accepts_buttons)
            .field("listen_timeout", &self.listen_timeout)
            .finish_non_exhaustive()
    }
}

enum Round {
    Answer(RawAnswer),
    Rejected(Rejection),
    Stop(StopReason),
}

/// Everything a step needs to talk to the visitor.
pub struct DialogContext<'a> {
    pub voice: &'a VoiceChannel,
    pub button: &'a ButtonChannel,
    pub events: &'a DialogEventBus,
    pub language: Language,
    /// Session token; key presses do not cancel it.
    pub cancel: &'a CancelToken,
    /// Used when the step sets no timeout of its own.
    pub listen_timeout: Duration,
}

impl DialogContext<'_> {
    /// Speak; a key press only cuts the prompt short.
    fn say(&self, text: &str, interruptible: bool) -> Option<StopReason> {
        self.voice
            .say(text, self.language, self.cancel, interruptible)
            .filter(|reason| reason.ends_session())
    }

    fn round(&self, request: &CaptureRequest) -> Round {
        if let Some(reason) = self.cancel.stop_reason() {
            return Round::Stop(reason);
        }
        if let Some(round) = self.take_key(request) {
            return round;
        }
        match self.voice.capture(request, self.cancel) {
            Capture::Answer(answer) => Round::Answer(answer),
            Capture::Cancelled(reason) => Round::Stop(reason),
            Capture::Preempted => self
                .take_key(request)
                .unwrap_or_else(|| Round::Rejected(Rejection::invalid("key press vanished"))),
            Capture::Unusable(reason) => {
                Round::Rejected(Rejection::invalid(reason).with_message(UNHEARD_MESSAGE))
            }
            Capture::Nothing => {
                Round::Rejected(Rejection::invalid("nothing heard").with_message(UNHEARD_MESSAGE))
            }
        }
    }

    fn take_key(&self, request: &CaptureRequest) -> Option<Round> {
        match self.button.capture(request, self.cancel) {
            Capture::Answer(answer) => {
                debug!(answer = %answer.as_text(), "key consumed");
                self.events
                    .emit(DialogEventKind::KeyConsumed, &answer.as_text(), self.language);
                Some(Round::Answer(answer))
            }
            Capture::Cancelled(reason) => Some(Round::Stop(reason)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityGuard;
    use crate::channel::ButtonLatch;
    use crate::collab::stub::{
        CannedCaseRecords, Heard, IdentityTranslator, RecordingSynthesizer, ScriptedRecognizer,
    };
    use crate::collab::Collaborators;
    use std::sync::Arc;

    struct Rig {
        guard: ActivityGuard,
        latch: ButtonLatch,
        recognizer: Arc<ScriptedRecognizer>,
        tts: Arc<RecordingSynthesizer>,
        voice: VoiceChannel,
        button: ButtonChannel,
        events: DialogEventBus,
    }

    impl Rig {
        fn new(script: Vec<Heard>) -> Self {
            let guard = ActivityGuard::default();
            let latch = ButtonLatch::new(guard.clone());
            let recognizer = Arc::new(ScriptedRecognizer::new(script));
            let tts = Arc::new(RecordingSynthesizer::new());
            let events = DialogEventBus::new();
            let collab = Collaborators::new(
                Arc::clone(&recognizer),
                Arc::clone(&tts),
                IdentityTranslator,
                CannedCaseRecords::new(),
            );
            let voice = VoiceChannel::new(collab, guard.clone(), latch.clone(), events.clone());
            let button = ButtonChannel::new(latch.clone());
            Self {
                guard,
                latch,
                recognizer,
                tts,
                voice,
                button,
                events,
            }
        }

        fn run<T>(&self, step: &DialogStep<T>) -> StepOutcome<T> {
            let cancel = self.guard.cancel_token(None);
            let ctx = DialogContext {
                voice: &self.voice,
                button: &self.button,
                events: &self.events,
                language: Language::En,
                cancel: &cancel,
                listen_timeout: Duration::from_secs(7),
            };
            step.run(&ctx)
        }
    }

    fn year_step() -> DialogStep<String> {
        DialogStep::new("year", "Please speak year.", |answer, language| {
            crate::normalize::spoken_case_year(&answer.as_text(), language)
                .ok_or_else(|| Rejection::invalid("not a year"))
        })
    }

    #[test]
    fn valid_voice_answer_is_normalized() {
        let rig = Rig::new(vec![Heard::text("two zero two five")]);
        assert_eq!(rig.run(&year_step()), StepOutcome::Answered("2025".to_string()));
        assert_eq!(rig.recognizer.calls(), 1);
    }

    #[test]
    fn always_invalid_fails_after_three_attempts() {
        let rig = Rig::new(vec![
            Heard::text("soon"),
            Heard::text("later"),
            Heard::text("never"),
            Heard::text("2025"),
        ]);
        assert_eq!(rig.run(&year_step()), StepOutcome::Failed);
        assert_eq!(rig.recognizer.calls(), 3);
        let spoken = rig.tts.spoken();
        assert_eq!(spoken.first().map(String::as_str), Some("Please speak year."));
        assert_eq!(spoken.last().map(String::as_str), Some(FAILED_MESSAGE));
        assert_eq!(spoken.iter().filter(|s| *s == INVALID_MESSAGE).count(), 2);
    }

    #[test]
    fn empty_recognition_consumes_an_attempt() {
        let rig = Rig::new(vec![Heard::text(""), Heard::Unrecognized, Heard::text("2024")]);
        assert_eq!(rig.run(&year_step()), StepOutcome::Answered("2024".to_string()));
        assert_eq!(rig.recognizer.calls(), 3);
        assert!(rig.tts.spoken().iter().any(|s| s == UNHEARD_MESSAGE));
    }

    #[test]
    fn latched_key_answers_without_listening() {
        let rig = Rig::new(vec![Heard::text("unused")]);
        let step = DialogStep::new("digit", "Press a key.", |answer, _| match answer {
            RawAnswer::Button(key) => Ok(*key),
            RawAnswer::Voice(_) => Err(Rejection::invalid("voice")),
        });
        rig.latch.press('7');
        assert_eq!(rig.run(&step), StepOutcome::Answered('7'));
        assert_eq!(rig.tts.spoken(), ["Press a key."]);
        assert_eq!(rig.recognizer.calls(), 0);
        assert_eq!(rig.latch.get_latched_key(), None);
    }

    #[test]
    fn voice_only_step_ignores_the_keypad() {
        let rig = Rig::new(vec![Heard::text("2023")]);
        rig.latch.press('9');
        assert_eq!(
            rig.run(&year_step().voice_only()),
            StepOutcome::Answered("2023".to_string())
        );
        // Success clears the latch even though the key was never consumed.
        assert_eq!(rig.latch.get_latched_key(), None);
    }

    #[test]
    fn stop_before_the_step_cancels_without_prompting() {
        let rig = Rig::new(vec![Heard::text("2025")]);
        rig.guard.request_stop();
        assert_eq!(rig.run(&year_step()), StepOutcome::Cancelled(StopReason::Stopped));
        assert!(rig.tts.spoken().is_empty());
        assert_eq!(rig.recognizer.calls(), 0);
    }

    #[test]
    fn step_timeout_overrides_context_default() {
        let rig = Rig::new(vec![Heard::text("2025")]);
        let step = year_step().listen_timeout(Duration::from_secs(10));
        rig.run(&step);
        assert_eq!(rig.recognizer.timeouts(), vec![Duration::from_secs(10)]);
    }
}
