//! WireGuard configuration and management
//!
//! # Components
//!
//! - **Config**: Rendering the network into wg-quick configuration text
//! - **Keys**: Key pair and preshared key generation
//! - **Backend**: Control of the live interface
//! - **Sync**: Persistence plus reconciliation of the live interface

pub mod backend;
mod config;
mod keys;
mod sync;

pub use config::{
    parse_peer_blocks, ConfigRenderer, InterfaceConfig, ParsedPeer, PeerConfig, WireGuardConfig,
};
pub use keys::{KeyPair, WireGuardKeys, KEY_LENGTH};
pub use sync::{SyncEngine, SyncState, SyncStatus};
