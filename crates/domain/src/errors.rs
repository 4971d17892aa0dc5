//! Error types used throughout the bridge
//!
//! One enum per protocol phase, plus [`RwsError`] for the plugin lifecycle.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single HTTP exchange. Never retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Whether the failure happened below HTTP (connect, timeout, reset).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Credential retrieval or login failed. Fatal to starting a plugin.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Digest challenge error: {0}")]
    Challenge(String),

    #[error("Login rejected with status {0}")]
    Rejected(u16),

    #[error("Login request failed: {0}")]
    Transport(#[from] TransportError),
}

/// Subscription setup failed. Fatal to starting the stream.
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("Subscription request has no resources")]
    EmptyRequest,

    #[error("Resource lookup failed for {path}: {source}")]
    Lookup {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Failed to create queue {name}: {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Subscription request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Subscription rejected with status {0}")]
    UnexpectedStatus(u16),

    #[error("Subscription response carries no location")]
    MissingLocation,

    #[error("Invalid stream location: {0}")]
    InvalidLocation(String),
}

/// Upgrade to the push transport failed. Fatal to this connection attempt.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Upgrade answered with status {0}")]
    UnexpectedStatus(u16),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Stream already connected")]
    AlreadyConnected,
}

/// A frame did not match the expected event structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed event document: {0}")]
    Malformed(String),

    #[error("Event document contains no list items")]
    NoEvents,

    #[error("Event list item has no class attribute")]
    MissingKind,
}

/// Categories of write errors for the caller's retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteErrorCategory {
    /// The record cannot be turned into a command - non-retryable
    Encoding,
    /// Network/connection errors - retryable
    Network,
    /// Server errors (5xx, 429) - retryable
    Server,
    /// Client errors (4xx) - non-retryable
    Client,
    /// Writer used before connect - non-retryable
    State,
}

/// Outbound encode, size or transport failure.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Record has no message type tag")]
    MissingKind,

    #[error("Message has unknown type: {0}")]
    UnknownKind(String),

    #[error("Record is missing field {0}")]
    MissingField(String),

    #[error("Field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Event severity {0} is not defined")]
    UnknownSeverity(String),

    #[error("Message is too long to send - max_bytes={limit}, msg_bytes={actual}")]
    TooLarge { limit: usize, actual: usize },

    #[error("Unable to send message: {0}")]
    Transport(#[from] TransportError),

    #[error("Unable to send message: status {0}")]
    Rejected(u16),

    #[error("Writer is not connected")]
    NotConnected,
}

impl WriteError {
    /// Get the error category for this error
    pub fn category(&self) -> WriteErrorCategory {
        match self {
            Self::MissingKind
            | Self::UnknownKind(_)
            | Self::MissingField(_)
            | Self::InvalidField { .. }
            | Self::UnknownSeverity(_)
            | Self::TooLarge { .. } => WriteErrorCategory::Encoding,
            Self::Transport(_) => WriteErrorCategory::Network,
            Self::Rejected(status) if *status >= 500 || *status == 429 => {
                WriteErrorCategory::Server
            }
            Self::Rejected(_) => WriteErrorCategory::Client,
            Self::NotConnected => WriteErrorCategory::State,
        }
    }

    /// Check if the batching caller should retry this write
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), WriteErrorCategory::Network | WriteErrorCategory::Server)
    }
}

/// Top-level error for plugin lifecycles
#[derive(Error, Debug)]
pub enum RwsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, RwsError>;
