//! Connection (undirected edge) model

use super::peer::PeerId;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order-independent key of an edge between two peers
///
/// The root peer always sorts first so that `a` is the server side of every
/// root connection; otherwise ids are ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId {
    a: PeerId,
    b: PeerId,
}

impl ConnectionId {
    /// Canonicalize a pair of peer ids
    pub fn new(x: PeerId, y: PeerId) -> Self {
        let swap = if y.is_root() {
            !x.is_root()
        } else if x.is_root() {
            false
        } else {
            y < x
        };

        if swap {
            Self { a: y, b: x }
        } else {
            Self { a: x, b: y }
        }
    }

    pub fn a(&self) -> &PeerId {
        &self.a
    }

    pub fn b(&self) -> &PeerId {
        &self.b
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        &self.a == peer || &self.b == peer
    }

    /// The opposite end of the edge, if `peer` is one of its ends
    pub fn other(&self, peer: &PeerId) -> Option<&PeerId> {
        if &self.a == peer {
            Some(&self.b)
        } else if &self.b == peer {
            Some(&self.a)
        } else {
            None
        }
    }

    pub fn is_loop(&self) -> bool {
        self.a == self.b
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Error returned when an allowed-IPs list does not parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedIpsParseError(pub String);

impl fmt::Display for AllowedIpsParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for AllowedIpsParseError {}

/// Comma-separated list of IPv4 CIDR blocks routed through a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AllowedIps(Vec<Ipv4Net>);

impl AllowedIps {
    pub fn new(nets: Vec<Ipv4Net>) -> Self {
        Self(nets)
    }

    /// A single host route
    pub fn host(addr: std::net::Ipv4Addr) -> Self {
        Self(vec![Ipv4Net::new_assert(addr, 32)])
    }

    pub fn nets(&self) -> &[Ipv4Net] {
        &self.0
    }
}

impl FromStr for AllowedIps {
    type Err = AllowedIpsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut nets = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(AllowedIpsParseError(format!(
                    "empty entry in '{}'",
                    s.trim()
                )));
            }
            let (addr, prefix) = part.split_once('/').ok_or_else(|| {
                AllowedIpsParseError(format!("'{}' is missing a prefix length", part))
            })?;
            let addr = addr
                .parse()
                .map_err(|_| AllowedIpsParseError(format!("'{}' is not an IPv4 address", addr)))?;
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| AllowedIpsParseError(format!("'{}' is not a prefix length", prefix)))?;
            let net = Ipv4Net::new(addr, prefix).map_err(|_| {
                AllowedIpsParseError(format!("prefix length {} is out of range 0-32", prefix))
            })?;
            nets.push(net);
        }
        Ok(Self(nets))
    }
}

impl TryFrom<String> for AllowedIps {
    type Error = AllowedIpsParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AllowedIps> for String {
    fn from(ips: AllowedIps) -> Self {
        ips.to_string()
    }
}

impl fmt::Display for AllowedIps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.0.iter().map(|net| net.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Keepalive interval for a connection, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentKeepalive {
    pub enabled: bool,
    pub value: u16,
}

impl PersistentKeepalive {
    pub fn disabled(value: u16) -> Self {
        Self {
            enabled: false,
            value,
        }
    }

    /// Interval to render, if switched on
    pub fn active(&self) -> Option<u16> {
        if self.enabled && self.value > 0 {
            Some(self.value)
        } else {
            None
        }
    }
}

impl Default for PersistentKeepalive {
    fn default() -> Self {
        Self::disabled(25)
    }
}

/// Link-level policy between two peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub preshared_key: String,
    pub enabled: bool,
    /// Routes `a` sends to `b`
    pub allowed_ips_a_to_b: AllowedIps,
    /// Routes `b` sends to `a`
    pub allowed_ips_b_to_a: AllowedIps,
    #[serde(default)]
    pub persistent_keepalive: PersistentKeepalive,
}

impl Connection {
    /// Allowed IPs as seen from `local`'s side of the edge
    pub fn allowed_ips_for(&self, local: &PeerId) -> Option<&AllowedIps> {
        if self.id.a() == local {
            Some(&self.allowed_ips_a_to_b)
        } else if self.id.b() == local {
            Some(&self.allowed_ips_b_to_a)
        } else {
            None
        }
    }
}
