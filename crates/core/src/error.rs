use std::path::PathBuf;
use thiserror::Error;

/// Result type for vigil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vigil operations
///
/// Only registration-time failures are surfaced to callers; conditions that
/// arise while a watch is live (transient probe failures, a lost OS
/// subscription) are handled inside the watcher and never appear here.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The path handed to `watch` does not exist
    #[error("watched path does not exist: {0}")]
    InvalidPath(PathBuf),

    /// An exclusion rule failed to compile
    #[error("invalid exclusion pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    /// The notification primitive refused a subscription
    #[error("subscription error: {0}")]
    Subscribe(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates an invalid-path error
    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Creates a pattern compilation error
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a subscription error
    pub fn subscribe(msg: impl Into<String>) -> Self {
        Self::Subscribe(msg.into())
    }

    /// Whether this error indicates the watched path was absent at
    /// registration time
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath(_))
    }
}
