//! Operator console commands.
//!
//! Each stdin line is parsed into a [`Command`] and executed against the
//! shared [`AppState`]. The console stands in for the kiosk hardware: the
//! camera, the keypad, the language buttons and the visitor's voice.

use anyhow::{anyhow, bail, Context};
use courtdesk_core::presence::FaceBox;
use courtdesk_core::Language;
use tracing::info;

use crate::auth::CloseAttempt;
use crate::state::AppState;

pub const HELP: &str = "\
commands:
  presence                     confirmed visitor presence
  face X Y W H FRAME_W FRAME_H one camera frame with a single face
  noface FRAME_W FRAME_H       one camera frame with nobody in it
  lang en|hi|pa                press a language button
  key K                        press keypad key K
  say TEXT                     the visitor speaks TEXT
  stop                         press Stop
  reset                        request a reset
  close                        open the Close password prompt
  pin DIGITS|back|enter|cancel use the Close password prompt
  status                       print the kiosk status
  help                         print this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinAction {
    Digits(String),
    Back,
    Enter,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Presence,
    Frame {
        face: Option<FaceBox>,
        frame_width: u32,
        frame_height: u32,
    },
    Language(Language),
    Key(char),
    Say(String),
    Stop,
    Reset,
    Close,
    Pin(PinAction),
    Status,
    Help,
}

/// What the console loop does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// Close was authorised.
    Quit { user: String },
}

fn numbers<const N: usize>(args: &[&str]) -> anyhow::Result<[u32; N]> {
    if args.len() != N {
        bail!("expected {N} numbers, got {}", args.len());
    }
    let mut out = [0u32; N];
    for (slot, raw) in out.iter_mut().zip(args) {
        *slot = raw
            .parse()
            .with_context(|| format!("not a pixel value: {raw}"))?;
    }
    Ok(out)
}

pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "presence" => Command::Presence,
        "face" => {
            let [x, y, width, height, frame_width, frame_height] = numbers::<6>(&args)?;
            Command::Frame {
                face: Some(FaceBox {
                    x,
                    y,
                    width,
                    height,
                }),
                frame_width,
                frame_height,
            }
        }
        "noface" => {
            let [frame_width, frame_height] = numbers::<2>(&args)?;
            Command::Frame {
                face: None,
                frame_width,
                frame_height,
            }
        }
        "lang" => Command::Language(
            Language::parse(rest).ok_or_else(|| anyhow!("unknown language: {rest:?}"))?,
        ),
        "key" => {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(key), None) => Command::Key(key),
                _ => bail!("key takes exactly one character"),
            }
        }
        "say" => {
            if rest.is_empty() {
                bail!("say needs the words the visitor speaks");
            }
            Command::Say(rest.to_string())
        }
        "stop" => Command::Stop,
        "reset" => Command::Reset,
        "close" => Command::Close,
        "pin" => Command::Pin(match rest {
            "back" => PinAction::Back,
            "enter" => PinAction::Enter,
            "cancel" => PinAction::Cancel,
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                PinAction::Digits(digits.to_string())
            }
            other => bail!("pin takes digits, back, enter or cancel, not {other:?}"),
        }),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        other => bail!("unknown command {other:?}; type `help`"),
    };
    Ok(Some(command))
}

fn accepted(yes: bool, what: &str) -> Reply {
    Reply::Text(if yes {
        format!("{what}: accepted")
    } else {
        format!("{what}: ignored")
    })
}

pub fn execute(state: &AppState, command: Command) -> anyhow::Result<Reply> {
    let engine = &state.engine;
    let reply = match command {
        Command::Presence => accepted(engine.presence_confirmed(), "presence"),
        Command::Frame {
            face,
            frame_width,
            frame_height,
        } => {
            let faces: Vec<FaceBox> = face.into_iter().collect();
            let started = engine.observe_frame(&faces, frame_width, frame_height);
            Reply::Text(if started {
                "frame: session started".into()
            } else {
                "frame: observed".into()
            })
        }
        Command::Language(language) => accepted(engine.language_button(language), "language button"),
        Command::Key(key) if state.close.is_open() => {
            accepted(state.close.key(key), "close prompt key")
        }
        Command::Key(key) => accepted(engine.press_key(key), "key"),
        Command::Say(text) => {
            state
                .utterances
                .send(text)
                .context("speech input is closed")?;
            Reply::Text("say: queued".into())
        }
        Command::Stop => {
            engine.request_stop();
            Reply::Text("stop: requested".into())
        }
        Command::Reset => {
            engine.request_reset();
            Reply::Text("reset: requested".into())
        }
        Command::Close => {
            state.close.open();
            Reply::Text("close: enter the password with `pin`".into())
        }
        Command::Pin(action) => pin(state, action),
        Command::Status => Reply::Text(serde_json::to_string_pretty(&state.status_report())?),
        Command::Help => Reply::Text(HELP.into()),
    };
    Ok(reply)
}

fn pin(state: &AppState, action: PinAction) -> Reply {
    let close = &state.close;
    if !close.is_open() {
        return Reply::Text("pin: the close prompt is not open".into());
    }
    match action {
        PinAction::Digits(digits) => {
            for digit in digits.chars() {
                close.key(digit);
            }
            Reply::Text(format!("pin: {}", "*".repeat(close.entered_len())))
        }
        PinAction::Back => {
            close.key('<');
            Reply::Text(format!("pin: {}", "*".repeat(close.entered_len())))
        }
        PinAction::Cancel => {
            close.cancel();
            Reply::Text("close: cancelled".into())
        }
        PinAction::Enter => match close.submit() {
            CloseAttempt::Accepted { user } => {
                info!(%user, "kiosk closing");
                Reply::Quit { user }
            }
            CloseAttempt::Rejected => Reply::Text("close: incorrect password".into()),
            CloseAttempt::Empty => Reply::Text("close: enter the password first".into()),
            CloseAttempt::NotOpen => Reply::Text("pin: the close prompt is not open".into()),
        },
    }
}
