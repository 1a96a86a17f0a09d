//! WireGuard backend trait definition
//!
//! Defines the interface the sync engine drives the live interface through,
//! allowing the wg-quick tooling to be swapped for an in-process fake.

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Type of WireGuard backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Shell out to `wg` and `wg-quick`
    Command,
    /// Keep interface state in memory (tests, dry runs)
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Command => write!(f, "command"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(BackendType::Command),
            "memory" => Ok(BackendType::Memory),
            other => Err(Error::InvalidArgument(format!(
                "Unknown backend '{}', expected 'command' or 'memory'",
                other
            ))),
        }
    }
}

/// Whether the interface currently exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Up,
    Down,
}

/// Statistics for a WireGuard peer, as reported by `wg show <iface> dump`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerStats {
    /// Peer public key
    pub public_key: String,
    /// Peer endpoint (if known)
    pub endpoint: Option<String>,
    /// Allowed IPs for this peer
    pub allowed_ips: Vec<String>,
    /// Time of the latest handshake
    pub last_handshake: Option<DateTime<Utc>>,
    /// Bytes received from peer
    pub rx_bytes: u64,
    /// Bytes transmitted to peer
    pub tx_bytes: u64,
    /// Persistent keepalive interval
    pub persistent_keepalive: Option<u16>,
}

/// WireGuard backend trait
///
/// Implementations only ever see rendered configuration text; the network
/// model stays on the manager side.
#[async_trait]
pub trait WireGuardBackend: Send + Sync {
    /// Get the backend type
    fn backend_type(&self) -> BackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;

    /// Bring the interface up from the persisted configuration at `config_path`
    async fn bring_up(&self, interface: &str, config_path: &Path) -> Result<()>;

    /// Tear the interface down
    async fn bring_down(&self, interface: &str, config_path: &Path) -> Result<()>;

    /// Apply `rendered` to the running interface without disturbing
    /// unchanged peers
    async fn reconcile(&self, interface: &str, rendered: &str) -> Result<()>;

    /// Live per-peer telemetry
    async fn dump(&self, interface: &str) -> Result<Vec<PeerStats>>;

    /// Whether the interface is up
    async fn interface_status(&self, interface: &str) -> Result<InterfaceStatus>;
}
