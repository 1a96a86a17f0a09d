//! Data models for mesh management

mod connection;
mod network;
mod peer;

pub use connection::{
    AllowedIps, AllowedIpsParseError, Connection, ConnectionId, PersistentKeepalive,
};
pub use network::Network;
pub use peer::{InterfaceOverride, Mobility, Peer, PeerId, ROOT_PEER_ID};
