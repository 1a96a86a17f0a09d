//! The peer/connection graph

use super::connection::{Connection, ConnectionId};
use super::peer::{Mobility, Peer, PeerId};
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

/// Peers and the connections between them
///
/// Both maps are ordered so that iteration, and therefore rendering and
/// allocation, is deterministic for a given network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub peers: BTreeMap<PeerId, Peer>,
    #[serde(
        serialize_with = "serialize_connections",
        deserialize_with = "deserialize_connections"
    )]
    pub connections: BTreeMap<ConnectionId, Connection>,
}

impl Network {
    /// A network holding only the root peer
    pub fn with_root(root: Peer) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(PeerId::root(), root);
        Self {
            peers,
            connections: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> Option<&Peer> {
        self.peers.get(&PeerId::root())
    }

    pub fn peer(&self, id: &PeerId) -> Result<&Peer> {
        self.peers
            .get(id)
            .ok_or_else(|| Error::PeerNotFound(id.clone()))
    }

    pub fn peer_mut(&mut self, id: &PeerId) -> Result<&mut Peer> {
        self.peers
            .get_mut(id)
            .ok_or_else(|| Error::PeerNotFound(id.clone()))
    }

    pub fn connection(&self, id: &ConnectionId) -> Result<&Connection> {
        self.connections
            .get(id)
            .ok_or_else(|| Error::ConnectionNotFound(id.clone()))
    }

    pub fn connection_mut(&mut self, id: &ConnectionId) -> Result<&mut Connection> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| Error::ConnectionNotFound(id.clone()))
    }

    /// Connections with `peer` at either end
    pub fn connections_of<'a>(
        &'a self,
        peer: &'a PeerId,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .values()
            .filter(move |conn| conn.id.contains(peer))
    }

    /// Peer currently holding `address`, if any
    pub fn peer_with_address(&self, address: Ipv4Addr) -> Option<&Peer> {
        self.peers.values().find(|peer| peer.address == address)
    }

    pub fn used_addresses(&self) -> Vec<Ipv4Addr> {
        self.peers.values().map(|peer| peer.address).collect()
    }

    /// Remove a peer together with every connection touching it
    pub fn remove_peer(&mut self, id: &PeerId) -> Result<Peer> {
        let peer = self
            .peers
            .remove(id)
            .ok_or_else(|| Error::PeerNotFound(id.clone()))?;
        self.connections.retain(|conn_id, _| !conn_id.contains(id));
        Ok(peer)
    }

    /// Check every structural invariant of the graph
    pub fn validate(&self) -> Result<()> {
        let root = self
            .root()
            .ok_or_else(|| Error::InvalidModel("root peer is missing".to_string()))?;
        if !root.id.is_root() {
            return Err(Error::InvalidModel(format!(
                "root entry carries id '{}'",
                root.id
            )));
        }

        let mut addresses: HashMap<Ipv4Addr, &PeerId> = HashMap::new();
        for (key, peer) in &self.peers {
            if key != &peer.id {
                return Err(Error::InvalidModel(format!(
                    "peer stored under '{}' has id '{}'",
                    key, peer.id
                )));
            }
            if peer.name.trim().is_empty() {
                return Err(Error::InvalidModel(format!("peer '{}' has no name", peer.id)));
            }
            if let Some(other) = addresses.insert(peer.address, &peer.id) {
                return Err(Error::InvalidModel(format!(
                    "address {} is shared by peers '{}' and '{}'",
                    peer.address, other, peer.id
                )));
            }
            match (peer.mobility, peer.endpoint.is_empty()) {
                (Mobility::Roaming, false) => {
                    return Err(Error::InvalidModel(format!(
                        "roaming peer '{}' has an endpoint",
                        peer.id
                    )))
                }
                (Mobility::Static, true) => {
                    return Err(Error::InvalidModel(format!(
                        "static peer '{}' has no endpoint",
                        peer.id
                    )))
                }
                _ => {}
            }
        }

        for (key, conn) in &self.connections {
            if key != &conn.id {
                return Err(Error::InvalidModel(format!(
                    "connection stored under '{}' has id '{}'",
                    key, conn.id
                )));
            }
            if ConnectionId::new(conn.id.a().clone(), conn.id.b().clone()) != conn.id {
                return Err(Error::InvalidModel(format!(
                    "connection '{}' is not in canonical order",
                    conn.id
                )));
            }
            if conn.id.is_loop() {
                return Err(Error::InvalidModel(format!(
                    "connection '{}' links a peer to itself",
                    conn.id
                )));
            }
            for end in [conn.id.a(), conn.id.b()] {
                if !self.peers.contains_key(end) {
                    return Err(Error::InvalidModel(format!(
                        "connection '{}' references unknown peer '{}'",
                        conn.id, end
                    )));
                }
            }
        }

        Ok(())
    }
}

fn serialize_connections<S>(
    connections: &BTreeMap<ConnectionId, Connection>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(connections.values())
}

fn deserialize_connections<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<ConnectionId, Connection>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Vec::<Connection>::deserialize(deserializer)?;
    Ok(list
        .into_iter()
        .map(|conn| (conn.id.clone(), conn))
        .collect())
}
