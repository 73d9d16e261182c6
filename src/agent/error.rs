//! Error types for the remote agent client.

use thiserror::Error;

/// Status codes answered by an overloaded or restarting agent server.
pub const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Errors that can occur while querying the agent API.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Server answered with a non-success status.
    #[error("agent API returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base URL or endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status()
            .is_some_and(|status| RETRYABLE_STATUSES.contains(&status))
    }
}

/// Convenience result alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> AgentError {
        AgentError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for code in RETRYABLE_STATUSES {
            assert!(status(code).is_retryable());
        }
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!AgentError::Config("x".to_string()).is_retryable());
    }
}
