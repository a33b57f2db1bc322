//! Remote API Error Types
//!
//! Structured errors reported by a remote storage client.
//! HTTP statuses are classified once here so the cache layer can tell
//! "not found" and "not modified" apart from every other failure.

/// Remote API error types
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Not found")]
    NotFound,

    #[error("Not modified since the known version")]
    NotModified,

    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Create a RemoteError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            304 => RemoteError::NotModified,
            404 => RemoteError::NotFound,
            _ => RemoteError::Http {
                status,
                body: body.to_string(),
            },
        }
    }

    /// Numeric status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::NotFound => Some(404),
            RemoteError::NotModified => Some(304),
            RemoteError::Http { status, .. } => Some(*status),
            RemoteError::Network(_) | RemoteError::InvalidResponse(_) | RemoteError::Io(_) => None,
        }
    }

    /// Response body text, empty for errors without one
    pub fn body(&self) -> &str {
        match self {
            RemoteError::Http { body, .. } => body,
            _ => "",
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RemoteError::from_status(status.as_u16(), &err.to_string()),
            None => RemoteError::Network(err.to_string()),
        }
    }
}
