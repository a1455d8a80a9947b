//! Core error types for TRIAD.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Parse error (unknown key, malformed document)
    ParseError { message: String },

    /// Validation error
    Validation { field: String, reason: String },

    /// Judgment record outside its declared shape or range
    InvalidOutput {
        /// Category key the record was produced for
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// A node ran before one of its prerequisites was recorded
    MissingDependency {
        /// Node that was dispatched
        node: String,
        /// Prerequisite key that was absent
        missing: String,
    },

    /// Not found
    NotFound { kind: String, id: String },

    /// Already exists
    AlreadyExists { kind: String, id: String },

    /// Timeout
    Timeout {
        /// Operation that timed out
        operation: String,
    },

    /// Cancelled
    Cancelled,

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::InvalidOutput { key, reason } => {
                write!(f, "Invalid judgment for {}: {}", key, reason)
            }
            Self::MissingDependency { node, missing } => {
                write!(f, "Node {} dispatched before {} was recorded", node, missing)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::AlreadyExists { kind, id } => write!(f, "{} already exists: {}", kind, id),
            Self::Timeout { operation } => write!(f, "Timeout: {}", operation),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}
