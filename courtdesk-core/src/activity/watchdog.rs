//! Single-shot inactivity timer.
//!
//! One background thread owns at most one pending deadline. `arm` replaces
//! the pending deadline, it never adds a second one, and expiry consumes it:
//! the callback runs once per arm.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

enum Command {
    Arm(Duration),
    Disarm,
}

pub(crate) struct Watchdog {
    tx: Sender<Command>,
}

impl Watchdog {
    /// Spawn the timer thread. The thread exits once the `Watchdog` is dropped.
    pub(crate) fn spawn<F>(on_expire: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Err(e) = thread::Builder::new()
            .name("courtdesk-watchdog".into())
            .spawn(move || run(rx, on_expire))
        {
            error!("failed to spawn watchdog thread, inactivity resets disabled: {e}");
        }
        Self { tx }
    }

    pub(crate) fn arm(&self, after: Duration) {
        let _ = self.tx.send(Command::Arm(after));
    }

    pub(crate) fn disarm(&self) {
        let _ = self.tx.send(Command::Disarm);
    }
}

fn run<F: Fn()>(rx: Receiver<Command>, on_expire: F) {
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => {
                let wait = at.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        deadline = None;
                        debug!("watchdog expired");
                        on_expire();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Arm(after) => deadline = Some(Instant::now() + after),
            Command::Disarm => deadline = None,
        }
    }
    debug!("watchdog thread exiting");
}
