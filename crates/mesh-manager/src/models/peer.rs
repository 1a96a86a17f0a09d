//! Peer model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use uuid::Uuid;

/// Id of the local server peer
pub const ROOT_PEER_ID: &str = "root";

/// Opaque peer identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The local server peer
    pub fn root() -> Self {
        Self(ROOT_PEER_ID.to_string())
    }

    /// A fresh random id for a new peer
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PEER_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a peer's network endpoint is known in advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mobility {
    /// Fixed, reachable endpoint
    Static,
    /// No fixed endpoint; the peer initiates
    #[default]
    Roaming,
}

impl fmt::Display for Mobility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mobility::Static => write!(f, "static"),
            Mobility::Roaming => write!(f, "roaming"),
        }
    }
}

/// Optional interface setting (DNS, MTU) that may be switched off
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterfaceOverride {
    pub enabled: bool,
    #[serde(default)]
    pub value: String,
}

impl InterfaceOverride {
    pub fn enabled(value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            value: value.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// The value, if the override is switched on
    pub fn active(&self) -> Option<&str> {
        if self.enabled {
            Some(self.value.as_str())
        } else {
            None
        }
    }
}

/// A WireGuard network participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub address: Ipv4Addr,
    pub public_key: String,
    pub private_key: String,
    pub mobility: Mobility,
    /// `host:port`, empty for roaming peers
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub dns: InterfaceOverride,
    #[serde(default)]
    pub mtu: InterfaceOverride,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Peer {
    /// Known endpoint, if any
    pub fn known_endpoint(&self) -> Option<&str> {
        match self.mobility {
            Mobility::Static if !self.endpoint.is_empty() => Some(self.endpoint.as_str()),
            _ => None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
