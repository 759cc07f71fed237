//! Error types shared by the bot and the paper terminal.
//!
//! The `BridgeError` enum unifies transport, decoding, configuration and
//! channel failures so both crates can propagate a single error type.
use std::io;
use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;

/// Unified error type shared by the bot and the terminal.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No response arrived before the deadline. The effect of the command on
    /// the terminal is unknown.
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// The terminal endpoint cannot be reached (connect failed, peer closed).
    #[error("Terminal unreachable: {0}")]
    Unreachable(String),

    /// A payload was received but could not be decoded.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The terminal answered with a well-formed error.
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// The transport dialect has no encoding for the requested operation.
    #[error("Unsupported by this transport: {0}")]
    Unsupported(String),

    /// Invalid startup settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for BridgeError {
    fn from(err: PoisonError<T>) -> Self {
        BridgeError::MutexLock(err.to_string())
    }
}
