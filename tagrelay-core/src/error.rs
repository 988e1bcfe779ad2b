//! Error types for tagrelay

use std::time::Duration;
use thiserror::Error;

/// Main error type for tagrelay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// Actuation link could not be established or was lost
    #[error("Actuation link to {endpoint} failed: {reason}")]
    Link {
        /// Endpoint the link points at
        endpoint: String,
        /// Reason for the failure
        reason: String,
    },

    /// Connecting the actuation link took too long
    #[error("Connecting to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Endpoint the link points at
        endpoint: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Endpoint scheme is not one the link understands
    #[error("Unsupported endpoint: {endpoint}")]
    UnsupportedEndpoint {
        /// Endpoint as given
        endpoint: String,
    },

    /// Malformed wire message
    #[error("Protocol error: {message}")]
    ProtocolError {
        /// Error message
        message: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Media pipeline error surfaced to the coordinator
    #[error("Media error: {reason}")]
    Media {
        /// Reason for media error
        reason: String,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying serde error
        #[from]
        source: serde_json::Error,
    },
}

impl RelayError {
    /// Check if the operation may succeed when tried again later
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelayError::Link { .. } => true,
            RelayError::ConnectTimeout { .. } => true,
            RelayError::Io { .. } => true,
            RelayError::Media { .. } => true,
            RelayError::InvalidConfiguration { .. } => false,
            RelayError::UnsupportedEndpoint { .. } => false,
            RelayError::ProtocolError { .. } => false,
            RelayError::InvalidState { .. } => false,
            RelayError::Serialization { .. } => false,
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        RelayError::InvalidConfiguration {
            message: message.into(),
        }
    }
}
