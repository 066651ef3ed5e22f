//! Error types for query operations
//!
//! This module defines the classified failures a fetch or mutation can
//! settle with. The transport maps raw faults into these kinds; the cache
//! stores them per entry and the retry policy reads `is_retryable`.

use std::collections::BTreeMap;
use thiserror::Error;

/// Classification of a [`QueryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    NotFound,
    Conflict,
    Unknown,
    Serialization,
}

/// Query and mutation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Transport unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Unauthenticated or unauthorized
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Malformed request, with per-field messages when the server sent them
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Cached data did not decode to the requested type
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QueryError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach a field-level message to a validation error; other kinds are unchanged
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        if let QueryError::Validation { fields, .. } = &mut self {
            fields.insert(field.into(), message.into());
        }
        self
    }

    /// Classify an HTTP status code returned by the server
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => QueryError::Auth(message),
            400 | 422 => QueryError::validation(message),
            404 | 410 => QueryError::NotFound(message),
            409 => QueryError::Conflict(message),
            408 | 429 | 500..=599 => QueryError::Network(message),
            _ => QueryError::Unknown(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Network(_) => ErrorKind::Network,
            QueryError::Auth(_) => ErrorKind::Auth,
            QueryError::Validation { .. } => ErrorKind::Validation,
            QueryError::NotFound(_) => ErrorKind::NotFound,
            QueryError::Conflict(_) => ErrorKind::Conflict,
            QueryError::Unknown(_) => ErrorKind::Unknown,
            QueryError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Only transient transport failures are retried automatically
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Field-level messages of a validation error
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            QueryError::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(QueryError::from_status(401, "x").kind(), ErrorKind::Auth);
        assert_eq!(QueryError::from_status(403, "x").kind(), ErrorKind::Auth);
        assert_eq!(QueryError::from_status(400, "x").kind(), ErrorKind::Validation);
        assert_eq!(QueryError::from_status(404, "x").kind(), ErrorKind::NotFound);
        assert_eq!(QueryError::from_status(409, "x").kind(), ErrorKind::Conflict);
        assert_eq!(QueryError::from_status(503, "x").kind(), ErrorKind::Network);
        assert_eq!(QueryError::from_status(429, "x").kind(), ErrorKind::Network);
        assert_eq!(QueryError::from_status(418, "x").kind(), ErrorKind::Unknown);
    }

    #[test]
    fn only_network_errors_retry() {
        assert!(QueryError::Network("down".into()).is_retryable());
        assert!(!QueryError::Auth("login".into()).is_retryable());
        assert!(!QueryError::validation("bad").is_retryable());
        assert!(!QueryError::NotFound("gone".into()).is_retryable());
        assert!(!QueryError::Conflict("race".into()).is_retryable());
        assert!(!QueryError::Unknown("?".into()).is_retryable());
    }

    #[test]
    fn validation_carries_fields() {
        let err = QueryError::validation("invalid post")
            .with_field("title", "required")
            .with_field("content", "required");
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get("title").map(String::as_str), Some("required"));
        assert_eq!(fields.len(), 2);

        let other = QueryError::NotFound("x".into()).with_field("title", "ignored");
        assert!(other.field_errors().is_none());
    }

    #[test]
    fn json_errors_become_serialization() {
        let err: QueryError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}
