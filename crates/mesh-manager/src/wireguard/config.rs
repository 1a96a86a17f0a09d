//! WireGuard configuration generation
//!
//! Renders the network model into wg-quick configuration text, either for
//! the local server interface or for any single peer.

use crate::config::MeshConfig;
use crate::models::{AllowedIps, Connection, Network, Peer, PeerId};
use crate::{Error, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;

const HEADER: &str = "# Generated by mesh-manager. Manual edits will be overwritten.";

/// WireGuard `[Interface]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Private key (base64)
    pub private_key: String,
    /// Interface address with the subnet prefix
    pub address: Ipv4Net,
    /// Listen port
    pub listen_port: Option<u16>,
    /// DNS servers, as written by the user
    pub dns: Option<String>,
    pub mtu: Option<String>,
    pub post_up: Option<String>,
    pub post_down: Option<String>,
}

impl InterfaceConfig {
    /// Generate the `[Interface]` section
    pub fn to_config_string(&self) -> String {
        let mut config = String::new();

        writeln!(config, "[Interface]").unwrap();
        writeln!(config, "PrivateKey = {}", self.private_key).unwrap();
        writeln!(config, "Address = {}", self.address).unwrap();

        if let Some(port) = self.listen_port {
            writeln!(config, "ListenPort = {}", port).unwrap();
        }
        if let Some(ref dns) = self.dns {
            writeln!(config, "DNS = {}", dns).unwrap();
        }
        if let Some(ref mtu) = self.mtu {
            writeln!(config, "MTU = {}", mtu).unwrap();
        }
        if let Some(ref cmd) = self.post_up {
            writeln!(config, "PostUp = {}", cmd).unwrap();
        }
        if let Some(ref cmd) = self.post_down {
            writeln!(config, "PostDown = {}", cmd).unwrap();
        }

        config
    }
}

/// WireGuard `[Peer]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer public key (base64)
    pub public_key: String,
    /// Preshared key (base64)
    pub preshared_key: Option<String>,
    /// Routes sent to this peer
    pub allowed_ips: AllowedIps,
    /// `host:port`, if known
    pub endpoint: Option<String>,
    /// Persistent keepalive interval (seconds)
    pub persistent_keepalive: Option<u16>,
    /// Comment/description
    pub comment: Option<String>,
}

impl PeerConfig {
    /// Build the block `local` renders for the far end of `conn`
    pub fn for_connection(conn: &Connection, local: &PeerId, remote: &Peer) -> Result<Self> {
        let allowed_ips = conn.allowed_ips_for(local).ok_or_else(|| {
            Error::WireGuardConfig(format!("Connection {} does not involve {}", conn.id, local))
        })?;

        Ok(Self {
            public_key: remote.public_key.clone(),
            preshared_key: Some(conn.preshared_key.clone()),
            allowed_ips: allowed_ips.clone(),
            endpoint: remote.known_endpoint().map(str::to_string),
            persistent_keepalive: conn.persistent_keepalive.active(),
            comment: Some(format!("Peer: {} ({})", remote.name, remote.id)),
        })
    }

    /// Generate WireGuard config section for this peer
    pub fn to_config_string(&self) -> String {
        let mut config = String::new();

        writeln!(config).unwrap();
        if let Some(ref comment) = self.comment {
            writeln!(config, "# {}", single_line(comment)).unwrap();
        }
        writeln!(config, "[Peer]").unwrap();
        writeln!(config, "PublicKey = {}", self.public_key).unwrap();

        if let Some(ref psk) = self.preshared_key {
            writeln!(config, "PresharedKey = {}", psk).unwrap();
        }

        writeln!(config, "AllowedIPs = {}", self.allowed_ips).unwrap();

        if let Some(ref endpoint) = self.endpoint {
            writeln!(config, "Endpoint = {}", endpoint).unwrap();
        }

        if let Some(keepalive) = self.persistent_keepalive {
            writeln!(config, "PersistentKeepalive = {}", keepalive).unwrap();
        }

        config
    }
}

/// Complete configuration of one WireGuard interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireGuardConfig {
    pub interface: InterfaceConfig,
    pub peers: Vec<PeerConfig>,
}

impl WireGuardConfig {
    /// Generate complete WireGuard config file
    pub fn to_config_string(&self) -> String {
        let mut config = String::new();

        writeln!(config, "{}", HEADER).unwrap();
        writeln!(config).unwrap();
        config.push_str(&self.interface.to_config_string());

        for peer in &self.peers {
            config.push_str(&peer.to_config_string());
        }

        config
    }
}

/// Renders server and per-peer configuration from a network snapshot
///
/// Pure: the output depends only on the network and the settings captured
/// at construction.
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    subnet: Ipv4Net,
    listen_port: u16,
    default_dns: Option<String>,
    default_mtu: Option<String>,
    post_up: Option<String>,
    post_down: Option<String>,
}

impl ConfigRenderer {
    pub fn new(config: &MeshConfig) -> Self {
        Self {
            subnet: config.subnet,
            listen_port: config.port,
            default_dns: config.default_dns.clone(),
            default_mtu: config.default_mtu.map(|mtu| mtu.to_string()),
            post_up: config.post_up.clone(),
            post_down: config.post_down.clone(),
        }
    }

    fn interface_address(&self, peer: &Peer) -> Result<Ipv4Net> {
        Ipv4Net::new(peer.address, self.subnet.prefix_len())
            .map_err(|e| Error::WireGuardConfig(format!("Invalid address: {}", e)))
    }

    /// Peer blocks `local` sees, one per enabled connection touching it
    fn peer_sections(&self, network: &Network, local: &PeerId) -> Result<Vec<PeerConfig>> {
        network
            .connections_of(local)
            .filter(|conn| conn.enabled)
            .map(|conn| {
                let remote_id = conn.id.other(local).ok_or_else(|| {
                    Error::Internal(format!("Connection {} lost peer {}", conn.id, local))
                })?;
                let remote = network.peer(remote_id)?;
                PeerConfig::for_connection(conn, local, remote)
            })
            .collect()
    }

    /// Structured server configuration
    pub fn server_config(&self, network: &Network) -> Result<WireGuardConfig> {
        let root_id = PeerId::root();
        let root = network.peer(&root_id)?;

        let interface = InterfaceConfig {
            private_key: root.private_key.clone(),
            address: self.interface_address(root)?,
            listen_port: Some(self.listen_port),
            dns: None,
            mtu: root.mtu.active().map(str::to_string),
            post_up: self.post_up.clone(),
            post_down: self.post_down.clone(),
        };

        Ok(WireGuardConfig {
            interface,
            peers: self.peer_sections(network, &root_id)?,
        })
    }

    /// Server interface configuration text
    pub fn render_server(&self, network: &Network) -> Result<String> {
        Ok(self.server_config(network)?.to_config_string())
    }

    /// Structured configuration for a single peer
    pub fn peer_config(&self, network: &Network, peer_id: &PeerId) -> Result<WireGuardConfig> {
        let peer = network.peer(peer_id)?;

        let listen_port = peer
            .known_endpoint()
            .and_then(|endpoint| endpoint.rsplit_once(':'))
            .and_then(|(_, port)| port.parse().ok());

        let interface = InterfaceConfig {
            private_key: peer.private_key.clone(),
            address: self.interface_address(peer)?,
            listen_port,
            dns: peer
                .dns
                .active()
                .map(str::to_string)
                .or_else(|| self.default_dns.clone()),
            mtu: peer
                .mtu
                .active()
                .map(str::to_string)
                .or_else(|| self.default_mtu.clone()),
            post_up: None,
            post_down: None,
        };

        Ok(WireGuardConfig {
            interface,
            peers: self.peer_sections(network, peer_id)?,
        })
    }

    /// Client configuration text for `peer_id`, as handed out for download
    pub fn render_peer(&self, network: &Network, peer_id: &PeerId) -> Result<String> {
        Ok(self.peer_config(network, peer_id)?.to_config_string())
    }
}

/// A `[Peer]` block read back from configuration text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPeer {
    pub public_key: String,
    pub preshared_key: Option<String>,
    pub allowed_ips: Option<AllowedIps>,
    pub endpoint: Option<String>,
    pub persistent_keepalive: Option<u16>,
}

/// Parse every `[Peer]` block out of wg-quick style configuration text
pub fn parse_peer_blocks(text: &str) -> Result<Vec<ParsedPeer>> {
    let mut peers = Vec::new();
    let mut current: Option<ParsedPeer> = None;

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(peer) = current.take() {
                peers.push(finish_peer(peer)?);
            }
            if line.eq_ignore_ascii_case("[Peer]") {
                current = Some(ParsedPeer::default());
            }
            continue;
        }

        let Some(peer) = current.as_mut() else {
            continue;
        };

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::WireGuardConfig(format!("Line {}: expected 'Key = Value'", number + 1))
        })?;
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "publickey" => peer.public_key = value.to_string(),
            "presharedkey" => peer.preshared_key = Some(value.to_string()),
            "allowedips" => {
                let ips = value.parse().map_err(|e| {
                    Error::WireGuardConfig(format!("Line {}: {}", number + 1, e))
                })?;
                peer.allowed_ips = Some(ips);
            }
            "endpoint" => peer.endpoint = Some(value.to_string()),
            "persistentkeepalive" => {
                peer.persistent_keepalive = value.parse().ok();
            }
            _ => {}
        }
    }

    if let Some(peer) = current {
        peers.push(finish_peer(peer)?);
    }

    Ok(peers)
}

/// Comment text with control characters blanked, so it cannot spill onto
/// a second line
fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn finish_peer(peer: ParsedPeer) -> Result<ParsedPeer> {
    if peer.public_key.is_empty() {
        return Err(Error::WireGuardConfig(
            "[Peer] block without PublicKey".to_string(),
        ));
    }
    Ok(peer)
}
