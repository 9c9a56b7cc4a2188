//! Error types for the service clients.

use thiserror::Error;

/// Errors that can occur while talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an unexpected status code.
    #[error("unexpected status {status} from {service}")]
    Status { service: &'static str, status: u16 },

    /// Failed to decode a JSON payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Required credentials or settings are missing.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// No port in the configured range answered like the service.
    #[error("no {service} found on {host} ports {from}-{to}")]
    Unreachable {
        service: &'static str,
        host: String,
        from: u16,
        to: u16,
    },

    /// Something answered on the port, but not the expected service.
    #[error("{service} did not identify itself: {detail}")]
    Unrecognized {
        service: &'static str,
        detail: String,
    },

    /// The download client rejected a call.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The tracker served a page for an anonymous visitor.
    #[error("not logged in to tracker")]
    NotLoggedIn,
}

impl ServiceError {
    pub(crate) fn status(service: &'static str, status: reqwest::StatusCode) -> Self {
        Self::Status {
            service,
            status: status.as_u16(),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
