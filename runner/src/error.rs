//! Error types for the sequence runner

use thiserror::Error;

/// Result type alias for the sequence runner
pub type Result<T> = std::result::Result<T, RunnerError>;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON settings error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Sequence has no frames: {0}")]
    EmptySequence(String),

    #[error("Tracker error: {0}")]
    Tracker(#[from] kcftrack::KcfError),
}

impl RunnerError {
    pub fn region<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRegion(msg.into())
    }
}
