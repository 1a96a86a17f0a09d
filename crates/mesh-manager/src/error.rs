//! Error types for mesh management

use crate::models::{ConnectionId, PeerId};
use ipnet::Ipv4Net;
use thiserror::Error;

/// Result type for mesh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Mesh manager errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Model errors
    #[error("Invalid network model: {0}")]
    InvalidModel(String),

    #[error("Invalid value for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    // Allocation errors
    #[error("No free address left in {0}")]
    AddressSpaceExhausted(Ipv4Net),

    // WireGuard errors
    #[error("WireGuard sync failed: {0}")]
    Sync(String),

    #[error("WireGuard is not usable on this host: {0}")]
    Environment(String),

    #[error("WireGuard configuration error: {0}")]
    WireGuardConfig(String),

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Shorthand for a field validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, if this is a validation error
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether a later resync may succeed without changing the model
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Sync(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<ipnet::PrefixLenError> for Error {
    fn from(e: ipnet::PrefixLenError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(e: std::net::AddrParseError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}
