//! Three-way diff between an edited peer and the authoritative network

use super::validate::{
    validate_address, validate_allowed_ips, validate_dns, validate_endpoint, validate_keepalive,
    validate_mtu, validate_name,
};
use crate::models::{
    AllowedIps, ConnectionId, InterfaceOverride, Mobility, Network, PeerId, PersistentKeepalive,
};
use crate::{Error, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// A client's working copy of one of the edited peer's connections
///
/// Directions are relative to the edited peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEdit {
    /// The other end of the connection
    pub peer: PeerId,
    pub enabled: bool,
    /// What the edited peer routes to `peer`
    pub allowed_ips_to_peer: String,
    /// What `peer` routes to the edited peer
    pub allowed_ips_from_peer: String,
    #[serde(default)]
    pub persistent_keepalive: PersistentKeepalive,
}

/// A client's working copy of a peer and its connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEdit {
    pub name: String,
    pub address: String,
    pub mobility: Mobility,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub dns: InterfaceOverride,
    #[serde(default)]
    pub mtu: InterfaceOverride,
    #[serde(default)]
    pub connections: Vec<ConnectionEdit>,
}

impl PeerEdit {
    /// Working copy mirroring the current state of `peer_id`
    pub fn from_network(network: &Network, peer_id: &PeerId) -> Result<Self> {
        let peer = network.peer(peer_id)?;

        let mut connections = Vec::new();
        for conn in network.connections_of(peer_id) {
            let other = conn.id.other(peer_id).ok_or_else(|| {
                Error::Internal(format!("connection {} lost peer {}", conn.id, peer_id))
            })?;
            let (to_peer, from_peer) = if conn.id.a() == peer_id {
                (&conn.allowed_ips_a_to_b, &conn.allowed_ips_b_to_a)
            } else {
                (&conn.allowed_ips_b_to_a, &conn.allowed_ips_a_to_b)
            };
            connections.push(ConnectionEdit {
                peer: other.clone(),
                enabled: conn.enabled,
                allowed_ips_to_peer: to_peer.to_string(),
                allowed_ips_from_peer: from_peer.to_string(),
                persistent_keepalive: conn.persistent_keepalive,
            });
        }

        Ok(Self {
            name: peer.name.clone(),
            address: peer.address.to_string(),
            mobility: peer.mobility,
            endpoint: peer.endpoint.clone(),
            dns: peer.dns.clone(),
            mtu: peer.mtu.clone(),
            connections,
        })
    }

    /// Mutable access to the working copy of the connection with `peer`
    pub fn connection_mut(&mut self, peer: &PeerId) -> Option<&mut ConnectionEdit> {
        self.connections.iter_mut().find(|c| &c.peer == peer)
    }
}

/// One differing peer field, carrying the validated new value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PeerFieldChange {
    Name(String),
    Address(Ipv4Addr),
    Mobility(Mobility),
    Endpoint(String),
    Dns(InterfaceOverride),
    Mtu(InterfaceOverride),
}

/// One differing connection field, in canonical direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ConnectionFieldChange {
    Enabled(bool),
    AllowedIpsAToB(AllowedIps),
    AllowedIpsBToA(AllowedIps),
    PersistentKeepalive(PersistentKeepalive),
}

/// Field changes of one existing connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionChange {
    pub id: ConnectionId,
    pub changes: Vec<ConnectionFieldChange>,
}

/// A connection to create; the preshared key is generated on apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedConnection {
    pub id: ConnectionId,
    pub enabled: bool,
    pub allowed_ips_a_to_b: AllowedIps,
    pub allowed_ips_b_to_a: AllowedIps,
    pub persistent_keepalive: PersistentKeepalive,
}

/// Validated difference between a working copy and the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditDiff {
    pub peer_id: PeerId,
    pub peer_changes: Vec<PeerFieldChange>,
    pub changed: Vec<ConnectionChange>,
    pub added: Vec<AddedConnection>,
    pub removed: Vec<ConnectionId>,
}

impl EditDiff {
    pub fn is_empty(&self) -> bool {
        self.peer_changes.is_empty()
            && self.changed.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
    }
}

/// Validated connection fields in canonical direction
struct ResolvedConnection {
    id: ConnectionId,
    enabled: bool,
    a_to_b: AllowedIps,
    b_to_a: AllowedIps,
    keepalive: PersistentKeepalive,
}

fn resolve_connection(peer_id: &PeerId, edit: &ConnectionEdit) -> Result<ResolvedConnection> {
    let to_peer = validate_allowed_ips("allowed_ips_to_peer", &edit.allowed_ips_to_peer)?;
    let from_peer = validate_allowed_ips("allowed_ips_from_peer", &edit.allowed_ips_from_peer)?;
    let keepalive = validate_keepalive(edit.persistent_keepalive)?;

    let id = ConnectionId::new(peer_id.clone(), edit.peer.clone());
    let (a_to_b, b_to_a) = if id.a() == peer_id {
        (to_peer, from_peer)
    } else {
        (from_peer, to_peer)
    };

    Ok(ResolvedConnection {
        id,
        enabled: edit.enabled,
        a_to_b,
        b_to_a,
        keepalive,
    })
}

fn diff_peer_fields(
    network: &Network,
    subnet: Ipv4Net,
    peer_id: &PeerId,
    edit: &PeerEdit,
) -> Result<Vec<PeerFieldChange>> {
    let current = network.peer(peer_id)?;
    let mut changes = Vec::new();

    if edit.name.trim() != current.name {
        changes.push(PeerFieldChange::Name(validate_name(&edit.name)?));
    }

    if edit.address.trim() != current.address.to_string() {
        let address = validate_address(&edit.address, subnet, network, Some(peer_id))?;
        if peer_id.is_root() && address != current.address {
            return Err(Error::validation(
                "address",
                "the root peer keeps the interface address",
            ));
        }
        if address != current.address {
            changes.push(PeerFieldChange::Address(address));
        }
    }

    if edit.mobility != current.mobility {
        changes.push(PeerFieldChange::Mobility(edit.mobility));
    }

    // Roaming peers have no endpoint whatever the form still holds
    let endpoint = match edit.mobility {
        Mobility::Roaming => String::new(),
        Mobility::Static => edit.endpoint.trim().to_string(),
    };
    if endpoint != current.endpoint {
        let endpoint = if endpoint.is_empty() {
            if edit.mobility == Mobility::Static {
                return Err(Error::validation("endpoint", "a static peer needs an endpoint"));
            }
            endpoint
        } else {
            validate_endpoint(&endpoint)?
        };
        changes.push(PeerFieldChange::Endpoint(endpoint));
    }

    if edit.dns != current.dns {
        let dns = validate_dns(&edit.dns)?;
        if dns != current.dns {
            changes.push(PeerFieldChange::Dns(dns));
        }
    }

    if edit.mtu != current.mtu {
        let mtu = validate_mtu(&edit.mtu)?;
        if mtu != current.mtu {
            changes.push(PeerFieldChange::Mtu(mtu));
        }
    }

    Ok(changes)
}

/// Classify every field and connection of `edit` against `network`
///
/// Aborts on the first invalid value with `Error::Validation` naming the
/// field; a returned diff only carries validated values.
pub fn compute_diff(
    network: &Network,
    subnet: Ipv4Net,
    peer_id: &PeerId,
    edit: &PeerEdit,
) -> Result<EditDiff> {
    let peer_changes = diff_peer_fields(network, subnet, peer_id, edit)?;

    let mut proposed = BTreeMap::new();
    for conn_edit in &edit.connections {
        if &conn_edit.peer == peer_id {
            return Err(Error::validation(
                "connections",
                format!("peer '{}' cannot connect to itself", peer_id),
            ));
        }
        network.peer(&conn_edit.peer)?;
        let resolved = resolve_connection(peer_id, conn_edit)?;
        if proposed.insert(resolved.id.clone(), resolved).is_some() {
            return Err(Error::validation(
                "connections",
                format!("peer '{}' is listed twice", conn_edit.peer),
            ));
        }
    }

    let existing: BTreeSet<ConnectionId> = network
        .connections_of(peer_id)
        .map(|conn| conn.id.clone())
        .collect();

    let mut changed = Vec::new();
    let mut added = Vec::new();

    for (id, resolved) in proposed.iter() {
        match network.connections.get(id) {
            Some(current) => {
                let mut changes = Vec::new();
                if resolved.enabled != current.enabled {
                    changes.push(ConnectionFieldChange::Enabled(resolved.enabled));
                }
                if resolved.a_to_b != current.allowed_ips_a_to_b {
                    changes.push(ConnectionFieldChange::AllowedIpsAToB(resolved.a_to_b.clone()));
                }
                if resolved.b_to_a != current.allowed_ips_b_to_a {
                    changes.push(ConnectionFieldChange::AllowedIpsBToA(resolved.b_to_a.clone()));
                }
                if resolved.keepalive != current.persistent_keepalive {
                    changes.push(ConnectionFieldChange::PersistentKeepalive(resolved.keepalive));
                }
                if !changes.is_empty() {
                    changed.push(ConnectionChange {
                        id: id.clone(),
                        changes,
                    });
                }
            }
            None => added.push(AddedConnection {
                id: id.clone(),
                enabled: resolved.enabled,
                allowed_ips_a_to_b: resolved.a_to_b.clone(),
                allowed_ips_b_to_a: resolved.b_to_a.clone(),
                persistent_keepalive: resolved.keepalive,
            }),
        }
    }

    let removed = existing
        .into_iter()
        .filter(|id| !proposed.contains_key(id))
        .collect();

    Ok(EditDiff {
        peer_id: peer_id.clone(),
        peer_changes,
        changed,
        added,
        removed,
    })
}
