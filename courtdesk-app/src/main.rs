//! CourtDesk kiosk host.
//!
//! Wires the console speech stand-ins and the HTTP case-records client into
//! a [`KioskEngine`], then drives it from stdin. Session, dialog and engine
//! events are forwarded to the log on a Tokio runtime.

mod api_client;
mod auth;
mod commands;
mod console;
mod settings;
mod state;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use courtdesk_core::collab::stub::IdentityTranslator;
use courtdesk_core::ipc::events::DialogEventKind;
use courtdesk_core::{Collaborators, KioskEngine, Translator};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use api_client::HttpCaseRecords;
use auth::{AuthList, CloseFlow};
use commands::Reply;
use console::{ConsoleSynthesizer, OperatorRecognizer, PhrasebookTranslator};
use settings::{default_settings_path, load_settings, save_settings};
use state::AppState;

/// Log every event of one broadcast stream until the sender goes away.
async fn forward<T, F>(label: &'static str, mut rx: broadcast::Receiver<T>, mut on_event: F)
where
    T: Clone + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    loop {
        match rx.recv().await {
            Ok(event) => on_event(event),
            Err(RecvError::Lagged(n)) => warn!("{label} receiver lagged by {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("courtdesk=info")),
        )
        .with_writer(io::stderr)
        .init();

    info!("CourtDesk starting");

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = std::env::var_os("COURTDESK_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!(path = %settings_path.display(), "could not write default settings: {e}");
        }
    }
    settings.apply_env_overrides();
    info!(path = %settings_path.display(), api = %settings.api_base_url, "settings loaded");

    // ── Collaborators ─────────────────────────────────────────────────────
    let records = HttpCaseRecords::new(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout_secs),
        Duration::from_secs(settings.health_timeout_secs),
    )
    .context("building the case-records client")?;
    records.health_check();

    let auth_path = settings.auth_path.clone().unwrap_or_else(|| {
        settings_path
            .parent()
            .map(|dir| dir.join("auth.json"))
            .unwrap_or_else(|| PathBuf::from("auth.json"))
    });
    let auth = AuthList::load(&auth_path);
    if auth.is_empty() {
        warn!(path = %auth_path.display(), "no operator passwords configured; Close is disabled");
    }

    let translator: Arc<dyn Translator> = match &settings.phrasebook_path {
        Some(path) => {
            let book = PhrasebookTranslator::load(path);
            if book.is_empty() {
                warn!(path = %path.display(), "phrasebook is empty; prompts stay in English");
            } else {
                info!(entries = book.len(), "phrasebook loaded");
            }
            Arc::new(book)
        }
        None => Arc::new(IdentityTranslator),
    };

    let (utterances, recognizer) = OperatorRecognizer::channel();
    let synthesizer =
        ConsoleSynthesizer::stdout(Duration::from_millis(settings.console_word_delay_ms));
    let collab = Collaborators::new(recognizer, synthesizer, translator, records);

    // ── Engine ────────────────────────────────────────────────────────────
    let engine = Arc::new(KioskEngine::new(settings.engine_config(), collab));
    let close = CloseFlow::new(engine.guard().clone(), auth);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("starting the event runtime")?;
    runtime.spawn(forward("status", engine.subscribe_status(), |event| {
        info!(
            session = event.session_id,
            state = ?event.state,
            detail = event.detail.as_deref().unwrap_or(""),
            "session status"
        );
    }));
    runtime.spawn(forward("dialog", engine.subscribe_dialog(), |event| {
        match event.kind {
            DialogEventKind::Prompt => {}
            DialogEventKind::Heard => info!(language = %event.language, "heard {:?}", event.text),
            DialogEventKind::KeyConsumed => info!("key {} consumed", event.text),
        }
    }));
    runtime.spawn(forward("engine", engine.subscribe_engine(), |event| {
        info!(status = ?event.status, detail = event.detail.as_deref().unwrap_or(""), "engine status");
    }));

    engine.start().context("starting the kiosk engine")?;
    let state = AppState::new(Arc::clone(&engine), utterances, close, settings, settings_path);

    // ── Operator console ──────────────────────────────────────────────────
    println!("{}", commands::HELP);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading operator input")?;
        let reply = commands::parse(&line).and_then(|cmd| match cmd {
            Some(cmd) => commands::execute(&state, cmd).map(Some),
            None => Ok(None),
        });
        match reply {
            Ok(Some(Reply::Text(text))) => println!("{text}"),
            Ok(Some(Reply::Quit { user })) => {
                println!("closing (authorised by {user})");
                break;
            }
            Ok(None) => {}
            Err(e) => println!("error: {e:#}"),
        }
        io::stdout().flush().ok();
    }

    if let Err(e) = state.engine.stop() {
        warn!("engine stop: {e}");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!(settings = %state.settings_path.display(), "CourtDesk stopped");
    Ok(())
}
