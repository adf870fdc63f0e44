//! Voice channel: translated prompt playback and one recognition round.
//!
//! Prompts are authored in English and translated to the session language at
//! dispatch time. Collaborator failures are downgraded here: a translation
//! error speaks the English text, a playback error is logged and skipped, a
//! recognition error becomes [`Capture::Unusable`].

use tracing::{debug, warn};

use super::{ButtonLatch, Capture, CaptureRequest, InputChannel, RawAnswer};
use crate::activity::{ActivityGuard, CancelToken, IdleWindow, PauseFlag, StopReason};
use crate::collab::{Collaborators, Playback};
use crate::error::CourtDeskError;
use crate::ipc::events::DialogEventKind;
use crate::ipc::DialogEventBus;
use crate::language::Language;

/// Language prompts are authored in.
pub const PROMPT_LANGUAGE: Language = Language::En;

#[derive(Clone)]
pub struct VoiceChannel {
    collab: Collaborators,
    guard: ActivityGuard,
    latch: ButtonLatch,
    events: DialogEventBus,
}

impl VoiceChannel {
    pub fn new(
        collab: Collaborators,
        guard: ActivityGuard,
        latch: ButtonLatch,
        events: DialogEventBus,
    ) -> Self {
        Self {
            collab,
            guard,
            latch,
            events,
        }
    }

    /// Translate `text` from [`PROMPT_LANGUAGE`], falling back to the source.
    pub fn translate(&self, text: &str, language: Language) -> String {
        match self
            .collab
            .translator
            .translate(text, PROMPT_LANGUAGE, language)
        {
            Ok(translated) => translated,
            Err(e) => {
                warn!(%language, "translation failed, speaking untranslated text: {e}");
                text.to_string()
            }
        }
    }

    /// Translate and speak `text`, blocking until playback ends.
    ///
    /// Returns the reason playback was cut short, if any. With
    /// `interruptible` set, a key pressed during playback stops it and is
    /// reported as [`StopReason::KeyPressed`]. A key already latched when
    /// playback starts does not silence the prompt; it is answered by the
    /// round that follows.
    pub fn say(
        &self,
        text: &str,
        language: Language,
        cancel: &CancelToken,
        interruptible: bool,
    ) -> Option<StopReason> {
        let mut token = cancel.scoped(PauseFlag::Speak);
        if interruptible && !self.latch.is_latched() {
            token = token.interrupted_by(&self.latch);
        }
        if let Some(reason) = token.stop_reason() {
            return Some(reason);
        }

        self.guard.touch_window(IdleWindow::Conversation);
        let spoken = self.translate(text, language);
        self.events.emit(DialogEventKind::Prompt, &spoken, language);

        // The microphone stays closed while the speaker is in use.
        self.guard.set_flag(PauseFlag::Listen, true);
        let result = self.collab.synthesizer.speak(&spoken, language, &token);
        if !self.guard.is_stopped() {
            self.guard.set_flag(PauseFlag::Listen, false);
        }
        // A stop or reset owns the watchdog deadline from here on.
        if !token.stop_reason().is_some_and(|r| r.ends_session()) {
            self.guard.touch_window(IdleWindow::Conversation);
        }

        match result {
            Ok(Playback::Completed) => None,
            Ok(Playback::Interrupted) => {
                let reason = token.stop_reason();
                debug!(?reason, "playback interrupted");
                reason
            }
            Err(e) => {
                warn!("playback failed, continuing: {e}");
                token.stop_reason()
            }
        }
    }

    /// Speak a finished result (narration), one paragraph at a time so the
    /// subtitle pane can follow along.
    pub fn narrate(&self, text: &str, language: Language, cancel: &CancelToken) -> Option<StopReason> {
        for block in text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
            if let Some(reason) = self.say(block, language, cancel, false) {
                return Some(reason);
            }
        }
        None
    }

    fn classify_stop(reason: StopReason) -> Capture {
        match reason {
            StopReason::KeyPressed => Capture::Preempted,
            other => Capture::Cancelled(other),
        }
    }
}

impl InputChannel for VoiceChannel {
    fn capture(&self, request: &CaptureRequest, cancel: &CancelToken) -> Capture {
        let mut token = cancel.scoped(PauseFlag::Listen);
        if request.accepts_buttons {
            token = token.interrupted_by(&self.latch);
        }
        if let Some(reason) = token.stop_reason() {
            return Self::classify_stop(reason);
        }

        self.guard.touch_window(IdleWindow::Conversation);
        let result = self
            .collab
            .recognizer
            .recognize(request.language, request.timeout, &token);

        // Recognition calls are not pre-emptible; re-check once they return.
        if let Some(reason) = token.stop_reason().filter(|r| r.ends_session()) {
            return Capture::Cancelled(reason);
        }
        self.guard.touch_window(IdleWindow::Conversation);

        match result {
            Ok(text) => {
                let text = text.trim().to_string();
                debug!(%text, "heard");
                self.events
                    .emit(DialogEventKind::Heard, &text, request.language);
                Capture::Answer(RawAnswer::Voice(text))
            }
            Err(CourtDeskError::Cancelled) => match token.stop_reason() {
                Some(reason) => Self::classify_stop(reason),
                None => Capture::Unusable("recognition cancelled".into()),
            },
            Err(e) if e.is_recognition_failure() => {
                debug!("recognition failed: {e}");
                Capture::Unusable(e.to_string())
            }
            Err(e) => {
                warn!("recognizer error: {e}");
                Capture::Unusable(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for VoiceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceChannel").finish_non_exhaustive()
    }
}
