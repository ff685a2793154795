//! Error types for the relay.
//!
//! None of these are fatal: each one is either reported to a single
//! connection or absorbed with a log line.

use thiserror::Error;

use crate::state::ConnectionId;

/// Failures raised while registering, routing or delivering.
#[derive(Debug, Error)]
pub enum RelayError {
    /// `store_user` for an identity that is already registered.
    #[error("user '{0}' already exists")]
    AlreadyExists(String),

    /// The referenced identity has no live connection.
    #[error("user '{0}' is not online")]
    TargetNotFound(String),

    /// The frame was not valid JSON or lacked required fields.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// A binary frame that is not valid UTF-8.
    #[error("malformed message: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The recipient's outbound queue is gone (connection closed).
    #[error("send to connection {0} failed")]
    SendFailure(ConnectionId),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Failures of the diagnostic journal's backing file.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The background writer task has stopped.
    #[error("journal writer is not running")]
    WriterGone,
}
