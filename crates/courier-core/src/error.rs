//! Error types for the dispatch engine.

use thiserror::Error;

/// Errors that can occur in the dispatch engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A matcher pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The chat gateway rejected a request.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The diagnostic paste sink failed.
    #[error("paste sink error: {0}")]
    Sink(String),

    /// The outbound queue has no consumer left.
    #[error("outbound queue closed")]
    QueueClosed,
}

/// Result type for dispatch engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by a watched folder.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Listing the monitored location failed.
    #[error("cannot scan {path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No new entry appeared within the allowed number of polls.
    #[error("no new file found after {polls} polls")]
    Timeout { polls: u32 },
}
