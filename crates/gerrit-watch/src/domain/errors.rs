//! Error types for the watcher and the review table.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a raw JSON object into an [`EventRecord`](super::EventRecord).
#[derive(Debug, Error)]
pub enum EventError {
    /// The object has no string `type` discriminator.
    #[error("event has no `type` field")]
    MissingType,

    /// The object has no `change` object.
    #[error("event has no `change` object")]
    MissingChange,

    /// The value is not a JSON object at all.
    #[error("event is not a JSON object")]
    NotAnObject,

    /// The line is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The object could not be decoded into its variant.
    #[error("malformed `{kind}` event: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by an [`EventSource`](crate::ports::EventSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The server rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The server or transport spoke something we cannot recover from.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O failed (spawn, pipe, read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream or query ended unexpectedly.
    #[error("connection closed: {0}")]
    Closed(String),

    /// A response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Operation attempted before `open` or after `close`.
    #[error("not connected")]
    NotConnected,
}

impl SourceError {
    /// Whether retrying can never succeed.
    ///
    /// Authentication and protocol failures do not heal on their own; everything
    /// else is assumed to be transient network trouble.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Protocol(_))
    }
}

/// Record log read/write failures. Always logged, never fatal.
#[derive(Debug, Error)]
pub enum RecordLogError {
    #[error("failed to open record file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read record file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to record file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised while applying an event to the review table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The event type has no mutation rule.
    #[error("unsupported event type `{0}`")]
    UnsupportedEvent(String),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("server host must not be empty")]
    EmptyHost,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("row capacity must be at least 1")]
    ZeroCapacity,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("max connection attempts must be at least 1")]
    ZeroAttempts,

    #[error("tick interval must be greater than zero")]
    ZeroTick,
}

/// Summary of a connection failure, safe to hand across the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attempt {attempt}: {message}")]
pub struct WatchFailure {
    /// 0-indexed attempt on which the failure happened.
    pub attempt: u32,
    /// Rendered error message.
    pub message: String,
    /// Whether the failure stopped the retry loop early.
    pub terminal: bool,
}

impl WatchFailure {
    pub fn from_source(attempt: u32, err: &SourceError) -> Self {
        Self {
            attempt,
            message: err.to_string(),
            terminal: err.is_terminal(),
        }
    }
}
