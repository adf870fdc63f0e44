use std::time::Duration;

use thiserror::Error;

/// All errors produced by courtdesk-core.
#[derive(Debug, Error)]
pub enum CourtDeskError {
    #[error("speech was not recognized")]
    Unrecognized,

    #[error("speech recognition service error: {0}")]
    RecognitionService(String),

    #[error("no speech heard within {0:?}")]
    RecognitionTimeout(Duration),

    #[error("speech playback error: {0}")]
    Playback(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("case-records transport error: {0}")]
    Transport(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("kiosk engine already running")]
    AlreadyRunning,

    #[error("kiosk engine not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CourtDeskError {
    /// Recognition failures are retried like invalid input.
    pub fn is_recognition_failure(&self) -> bool {
        matches!(
            self,
            CourtDeskError::Unrecognized
                | CourtDeskError::RecognitionService(_)
                | CourtDeskError::RecognitionTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CourtDeskError>;
