//! Oracle error types.

use triad_core::CoreError;

/// Errors from a judgment oracle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The call did not finish within its deadline
    #[error("Oracle call timed out after {after_ms}ms")]
    Timeout {
        /// Deadline that elapsed, in milliseconds
        after_ms: u64,
    },

    /// The reply could not be decoded into the requested record shape
    #[error("Invalid oracle output: {message}")]
    InvalidOutput {
        /// What was wrong
        message: String,
    },

    /// Connection or transport failure
    #[error("Transport error: {message}")]
    Transport {
        /// Underlying failure
        message: String,
    },

    /// The backend throttled the request
    #[error("Rate limit exceeded")]
    RateLimited {
        /// Suggested wait, if the backend sent one
        retry_after_secs: Option<u64>,
    },

    /// Non-success response from the backend
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// A scripted oracle has no reply for the key
    #[error("No scripted reply for {key}")]
    Unscripted {
        /// Category key that was requested
        key: String,
    },
}

impl OracleError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::RateLimited { .. }
        )
    }

    /// Short stable name of the error kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::InvalidOutput { .. } => "invalid_output",
            Self::Transport { .. } => "transport",
            Self::RateLimited { .. } => "rate_limited",
            Self::Api { .. } => "api",
            Self::Unscripted { .. } => "unscripted",
        }
    }
}

impl From<CoreError> for OracleError {
    fn from(err: CoreError) -> Self {
        Self::InvalidOutput {
            message: err.to_string(),
        }
    }
}
