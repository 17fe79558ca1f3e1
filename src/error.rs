//! Error types for the streaming client.

use std::time::Duration;
use thiserror::Error;

/// Disconnect codes that mean the credentials are no longer usable.
const AUTH_DISCONNECT_CODES: [u32; 2] = [6, 7];

/// Streaming client error type.
#[derive(Error, Debug)]
pub enum StreamError {
    /// HTTP client error (connect, TLS, body read)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint answered with a non-success status
    #[error("stream endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Credentials were rejected
    #[error("authentication rejected (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// Server sent a disconnect notice
    #[error("stream disconnected by server (code {code}): {reason}")]
    Disconnected { code: u32, reason: String },

    /// Nothing at all arrived within the inactivity window
    #[error("no data received for {0:?}")]
    InactivityTimeout(Duration),

    /// Remote host ended the response body
    #[error("stream closed by remote host")]
    Closed,

    /// Consecutive-failure ceiling reached
    #[error("gave up after {attempts} consecutive connection failures: {last}")]
    RetriesExhausted { attempts: u32, last: Box<StreamError> },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Whether the supervisor must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        match self {
            StreamError::Auth { .. }
            | StreamError::Config(_)
            | StreamError::RetriesExhausted { .. } => true,
            StreamError::Disconnected { code, .. } => AUTH_DISCONNECT_CODES.contains(code),
            _ => false,
        }
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
