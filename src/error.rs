//! Error types for fetch-runner
//!
//! This module provides the error handling surface for the library:
//! - The crate-level [`Error`] enum returned synchronously from API calls
//! - [`FetchError`] for failures produced by a [`crate::fetcher::Fetcher`]
//! - [`DatabaseError`] for the durable job store
//!
//! Fetch failures never escape a worker task as a fault: they are captured
//! and recorded as a terminal `Failed` state delivered to observers. Only
//! call-site usage errors (`InvalidArgument`, `ShuttingDown`, `NotFound`)
//! and storage errors surface through `Result` at the API boundary.

use thiserror::Error;

/// Result type alias for fetch-runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-runner
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "database_path")
        key: Option<String>,
    },

    /// Bad call-site usage (empty key or input); rejected synchronously,
    /// no task is created
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No task is known under the given key
    #[error("task not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Fetch operation failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors produced by a [`crate::fetcher::Fetcher`] implementation
///
/// Each variant maps onto a [`crate::types::FailureKind`] when the runner
/// records the terminal `Failed` state for a task.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Input is not a well-formed URL
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Connection attempt failed
    #[error("network error: {0}")]
    Network(String),

    /// The operation did not complete within its deadline
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Durable job store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_display_includes_detail() {
        let err = Error::InvalidArgument("key must not be empty".into());
        assert_eq!(err.to_string(), "invalid argument: key must not be empty");
    }

    #[test]
    fn shutting_down_display_is_stable() {
        assert_eq!(
            Error::ShuttingDown.to_string(),
            "shutdown in progress: not accepting new tasks"
        );
    }

    #[test]
    fn fetch_error_converts_into_error() {
        let err: Error = FetchError::Network("connection refused".into()).into();
        match err {
            Error::Fetch(FetchError::Network(msg)) => {
                assert!(msg.contains("refused"));
            }
            other => panic!("expected Fetch(Network), got: {other:?}"),
        }
    }

    #[test]
    fn database_error_display_includes_context() {
        let err = Error::Database(DatabaseError::QueryFailed("locked".into()));
        assert!(
            err.to_string().contains("query failed: locked"),
            "got: {err}"
        );
    }

    #[test]
    fn fetch_error_variants_are_distinguishable_by_message() {
        let cases = [
            (
                FetchError::MalformedInput("not-a-url".into()),
                "malformed input",
            ),
            (FetchError::Network("refused".into()), "network error"),
            (FetchError::Timeout("5s elapsed".into()), "timed out"),
        ];
        for (err, prefix) in cases {
            assert!(
                err.to_string().starts_with(prefix),
                "{err} should start with {prefix}"
            );
        }
    }
}
