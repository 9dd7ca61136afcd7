use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Failures reported by a browsing session
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("Interaction with element failed: {0}")]
    InteractionFailed(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// The main browsing context is gone; nothing else can succeed on this session.
    #[error("Browser session lost: {0}")]
    SessionLost(String),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        BrowserError::Timeout { what: what.into(), timeout }
    }

    /// Whether the error means the session itself is unusable
    pub fn is_session_lost(&self) -> bool {
        matches!(self, BrowserError::SessionLost(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Run-level failures that end a scrape
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Archive index {url} yielded no reaction links: {source}")]
    ArchiveUnreachable {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Failed to write checkpoint {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize dataset: {0}")]
    Serialization(#[from] serde_json::Error),
}
