//! WireGuard Mesh Manager
//!
//! Manages a WireGuard mesh anchored on one server ("root") peer:
//! - Peer/connection model with per-direction allowed IPs
//! - Deterministic address allocation from the mesh subnet
//! - Server and peer config rendering
//! - Durable state with atomic writes
//! - Live interface reconciliation without tearing down sessions
//! - Edit-diff/apply protocol for peer changes
//!
//! Features:
//! - Pluggable WireGuard backends (`wg`/`wg-quick` or in-memory)
//! - REST API with config downloads and QR codes

pub mod allocator;
pub mod api;
pub mod config;
pub mod edit;
pub mod error;
pub mod models;
pub mod service;
pub mod storage;
pub mod store;
pub mod wireguard;

// Re-export core types
pub use allocator::AddressAllocator;
pub use config::{ApiServerConfig, MeshConfig};
pub use edit::{compute_diff, EditDiff, EditSession, EditState, PeerEdit};
pub use error::{Error, Result};
pub use models::{
    AllowedIps, Connection, ConnectionId, InterfaceOverride, Mobility, Network, Peer, PeerId,
    PersistentKeepalive,
};
pub use service::{
    ApplyOutcome, AttachedPeer, CreateConnectionRequest, CreatePeerRequest, ManagerStatus,
    MeshManager, PeerSummary, Preamble,
};
pub use storage::NetworkStorage;
pub use store::NetworkStore;
pub use wireguard::backend::{
    BackendType, CommandBackend, InterfaceStatus, MemoryBackend, PeerStats, WireGuardBackend,
};
pub use wireguard::{
    ConfigRenderer, KeyPair, SyncEngine, SyncState, SyncStatus, WireGuardConfig, WireGuardKeys,
};
pub use api::{create_router, start_server, AppState};

/// Mesh address space defaults
pub mod address_space {
    use ipnet::Ipv4Net;
    use std::net::Ipv4Addr;

    /// Default mesh subnet: 10.8.0.0/24 (root at 10.8.0.1)
    pub const DEFAULT_SUBNET: Ipv4Net = Ipv4Net::new_assert(Ipv4Addr::new(10, 8, 0, 0), 24);

    /// Default WireGuard listen port
    pub const DEFAULT_LISTEN_PORT: u16 = 51820;

    /// Longest prefix that still leaves room for root and one peer
    pub const MAX_PREFIX_LEN: u8 = 30;
}
