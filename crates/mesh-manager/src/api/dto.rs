//! Data Transfer Objects for the REST API
//!
//! Request and response types for API endpoints.

use crate::models::{Connection, ConnectionId, PeerId, PersistentKeepalive};
use crate::service::PeerSummary;
use crate::wireguard::backend::InterfaceStatus;
use serde::{Deserialize, Serialize};

// ============================================================================
// Peer DTOs
// ============================================================================

/// Request to rename a peer
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

/// Request to move a peer to another address
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAddressRequest {
    pub address: String,
}

// ============================================================================
// Connection DTOs
// ============================================================================

/// Connection as returned by the API; the preshared key is not exposed
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionResponse {
    pub a: PeerId,
    pub b: PeerId,
    pub enabled: bool,
    pub allowed_ips_a_to_b: String,
    pub allowed_ips_b_to_a: String,
    pub persistent_keepalive: PersistentKeepalive,
}

impl From<&Connection> for ConnectionResponse {
    fn from(conn: &Connection) -> Self {
        Self {
            a: conn.id.a().clone(),
            b: conn.id.b().clone(),
            enabled: conn.enabled,
            allowed_ips_a_to_b: conn.allowed_ips_a_to_b.to_string(),
            allowed_ips_b_to_a: conn.allowed_ips_b_to_a.to_string(),
            persistent_keepalive: conn.persistent_keepalive,
        }
    }
}

/// Path of a connection: its two peer ids in any order
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionPath {
    pub a: PeerId,
    pub b: PeerId,
}

impl ConnectionPath {
    pub fn id(self) -> ConnectionId {
        ConnectionId::new(self.a, self.b)
    }
}

/// Whole network without key material
#[derive(Debug, Clone, Serialize)]
pub struct NetworkResponse {
    pub peers: Vec<PeerSummary>,
    pub connections: Vec<ConnectionResponse>,
}

// ============================================================================
// Server DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusResponse {
    pub interface: String,
    pub status: InterfaceStatus,
}

// ============================================================================
// Common DTOs
// ============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new(
            "NOT_FOUND",
            format!("{} with id '{}' not found", resource, id),
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new("SYNC_FAILED", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
