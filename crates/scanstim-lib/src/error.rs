use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a run. Anything not listed here is reported through
/// `anyhow` with context and is equally fatal.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("trial table has {found} rows; expected {expected}")]
    TrialCount { expected: usize, found: usize },
    #[error("unknown stimulus type: {0}")]
    UnknownStimType(String),
    #[error("missing media file {}", .0.display())]
    MissingMedia(PathBuf),
    #[error("invalid trial row {row}: {reason}")]
    InvalidTrial { row: usize, reason: String },
    #[error("no scanner trigger within {0:.1}s")]
    TriggerTimeout(f64),
    #[error("quit requested by operator")]
    Quit,
}

impl ScanError {
    /// True when the error chain bottoms out in an operator quit.
    pub fn is_quit(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<ScanError>(), Some(ScanError::Quit))
    }
}
