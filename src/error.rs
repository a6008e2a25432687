//! Error types for the mail pipeline
//!
//! Errors are split by where they surface:
//! - CoreError: malformed input records, rejected at the core boundary
//! - ConfigError: bad configuration, rejected when building components
//! - CollaboratorError: calendar / notification / storage failures

use std::path::PathBuf;
use thiserror::Error;

/// Contract violations on records handed to the core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Email record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Email record {id} is malformed: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Processing of email {id} aborted: {reason}")]
    Aborted { id: String, reason: String },
}

/// Configuration errors, raised while loading config or compiling pattern tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl ConfigError {
    pub(crate) fn pattern(pattern: &str, err: regex::Error) -> Self {
        ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Failures reported by external collaborators (calendar, notifier, file store).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    #[error("{service} rejected the request: {message}")]
    Rejected { service: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CollaboratorError {
    /// Returns true if the same request may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable { .. })
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        CollaboratorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        CollaboratorError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = CoreError::MissingField("id");
        assert_eq!(err.to_string(), "Email record is missing required field `id`");
    }

    #[test]
    fn test_retryable_classification() {
        let down = CollaboratorError::Unavailable {
            service: "calendar".to_string(),
            message: "timeout".to_string(),
        };
        let rejected = CollaboratorError::Rejected {
            service: "calendar".to_string(),
            message: "bad request".to_string(),
        };
        assert!(down.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!CollaboratorError::Io("disk full".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ConfigError = io.into();
        assert!(matches!(err, ConfigError::Io(ref m) if m.contains("gone")));
    }

    #[test]
    fn test_invalid_pattern_helper() {
        let bad = regex::Regex::new("(").unwrap_err();
        let err = ConfigError::pattern("(", bad);
        assert!(err.to_string().starts_with("Invalid pattern `(`"));
    }
}
