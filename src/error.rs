//! Error types for termsync.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TermSyncError`] enum.
//!
//! Only faults the caller cannot route around become errors: network
//! failures talking to the index store, authoritative store failures,
//! configuration problems and malformed input. An index store answering with
//! an HTTP error status is *not* an error; transport calls report that as an
//! unsuccessful outcome instead.
//!
//! # Examples
//!
//! ```
//! use termsync::error::{Result, TermSyncError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TermSyncError::invalid_argument("overlapping document ids"))
//! }
//!
//! assert!(example_operation().is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for termsync operations.
#[derive(Error, Debug)]
pub enum TermSyncError {
    /// I/O errors (reading config files, snapshots, mapping resources)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network-level failure talking to the index store (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure of the authoritative graph store
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller passed arguments that violate an operation's contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with TermSyncError.
pub type Result<T> = std::result::Result<T, TermSyncError>;

impl TermSyncError {
    /// Create a new transport error.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        TermSyncError::Transport(msg.into())
    }

    /// Create a new store error.
    pub fn store<S: Into<String>>(msg: S) -> Self {
        TermSyncError::Store(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TermSyncError::Config(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        TermSyncError::InvalidArgument(msg.into())
    }

    /// Whether this error is a network-level fault of the index transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, TermSyncError::Transport(_))
    }
}

impl From<reqwest::Error> for TermSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TermSyncError::Transport(format!("request timed out: {err}"))
        } else {
            TermSyncError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TermSyncError::transport("connection refused");
        assert_eq!(error.to_string(), "Transport error: connection refused");
        assert!(error.is_transport());

        let error = TermSyncError::config("empty index name");
        assert_eq!(error.to_string(), "Configuration error: empty index name");
        assert!(!error.is_transport());

        let error = TermSyncError::store("graph unavailable");
        assert_eq!(error.to_string(), "Store error: graph unavailable");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = TermSyncError::from(io_error);

        match error {
            TermSyncError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: TermSyncError = json_error.into();
        assert!(matches!(error, TermSyncError::Json(_)));
    }

    #[test]
    fn test_only_transport_faults_are_transport() {
        let errors = [
            TermSyncError::store("graph unavailable"),
            TermSyncError::config("bad thresholds"),
            TermSyncError::invalid_argument("overlapping ids"),
            TermSyncError::from(io::Error::other("disk")),
        ];
        assert!(errors.iter().all(|error| !error.is_transport()));
    }
}
