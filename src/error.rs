//! Error types for obdwatch
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for obdwatch operations
///
/// Transport failures and malformed frames never surface through this type
/// from the session core; they are absorbed by the reconnect policy and the
/// plain-text fallback respectively. What remains are failures a caller can
/// act on.
#[derive(Error, Debug)]
pub enum ObdWatchError {
    /// An outbound command was attempted while the session was not connected.
    ///
    /// The command is dropped; nothing is queued or retried.
    #[error("Not connected to the telemetry backend")]
    NotConnected,

    /// Telemetry buffer capacity outside `1..=MAX_BUFFER_CAPACITY`
    #[error(
        "Invalid buffer capacity: {0} (must be between 1 and {})",
        crate::session::buffer::MAX_BUFFER_CAPACITY
    )]
    InvalidCapacity(usize),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel-level failures (write to a closed socket, handshake failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend REST endpoint errors (non-2xx status, unexpected body)
    #[error("Backend API error: {0}")]
    Api(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for obdwatch operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type.
/// Typed failures such as [`ObdWatchError::NotConnected`] are recovered with
/// `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
