//! Mesh Manager Service
//!
//! Core orchestration service, providing:
//! - One-time load (or bootstrap) of the network and interface startup
//! - Peer and connection operations
//! - The edit-diff/apply protocol
//! - Server interface control and resync
//!
//! Every mutation runs under a single async lock held through commit,
//! persistence and reconciliation of the live interface.

use crate::allocator::AddressAllocator;
use crate::config::MeshConfig;
use crate::edit::validate::{
    validate_address, validate_allowed_ips, validate_dns, validate_endpoint, validate_keepalive,
    validate_mtu, validate_name, validate_peer_count, validate_peer_id,
};
use crate::edit::{
    ConnectionFieldChange, EditDiff, EditSession, PeerEdit, PeerFieldChange,
};
use crate::models::{
    Connection, ConnectionId, InterfaceOverride, Mobility, Network, Peer, PeerId,
    PersistentKeepalive,
};
use crate::storage::NetworkStorage;
use crate::store::NetworkStore;
use crate::wireguard::backend::{create_backend, InterfaceStatus, PeerStats, WireGuardBackend};
use crate::wireguard::{ConfigRenderer, KeyPair, SyncEngine, SyncState, WireGuardKeys};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Name given to the root peer on first run
pub const ROOT_PEER_NAME: &str = "this-server";

/// A peer the new peer is attached to at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedPeer {
    /// Existing peer
    pub peer: PeerId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// What the new peer routes to the existing one
    pub allowed_ips_new_to_old: String,
    /// What the existing peer routes to the new one
    pub allowed_ips_old_to_new: String,
    #[serde(default)]
    pub persistent_keepalive: Option<PersistentKeepalive>,
}

fn default_true() -> bool {
    true
}

/// Request to create a new peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePeerRequest {
    /// Id from a preamble; generated if absent
    #[serde(default)]
    pub id: Option<PeerId>,
    pub name: String,
    /// Specific address; allocated if absent
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mobility: Mobility,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub dns: InterfaceOverride,
    #[serde(default)]
    pub mtu: InterfaceOverride,
    pub attached: Vec<AttachedPeer>,
}

/// Request to connect two existing peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConnectionRequest {
    pub from: PeerId,
    pub to: PeerId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// What `from` routes to `to`
    pub allowed_ips_from_to: String,
    /// What `to` routes to `from`
    pub allowed_ips_to_from: String,
    #[serde(default)]
    pub persistent_keepalive: Option<PersistentKeepalive>,
}

/// Id and address a new peer would get right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
    pub peer_id: PeerId,
    pub address: Ipv4Addr,
    pub subnet: String,
}

/// Peer as listed, merged with live interface telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub id: PeerId,
    pub name: String,
    pub address: Ipv4Addr,
    pub public_key: String,
    pub mobility: Mobility,
    pub endpoint: String,
    pub dns: InterfaceOverride,
    pub mtu: InterfaceOverride,
    pub connections: usize,
    pub enabled_connections: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Endpoint the server last saw traffic from
    pub live_endpoint: Option<String>,
    pub latest_handshake_at: Option<DateTime<Utc>>,
    pub transfer_rx: u64,
    pub transfer_tx: u64,
    pub persistent_keepalive: Option<u16>,
}

impl PeerSummary {
    fn new(network: &Network, peer: &Peer, stats: Option<&PeerStats>) -> Self {
        let (connections, enabled_connections) = network
            .connections_of(&peer.id)
            .fold((0, 0), |(all, on), conn| (all + 1, on + usize::from(conn.enabled)));

        Self {
            id: peer.id.clone(),
            name: peer.name.clone(),
            address: peer.address,
            public_key: peer.public_key.clone(),
            mobility: peer.mobility,
            endpoint: peer.endpoint.clone(),
            dns: peer.dns.clone(),
            mtu: peer.mtu.clone(),
            connections,
            enabled_connections,
            created_at: peer.created_at,
            updated_at: peer.updated_at,
            live_endpoint: stats.and_then(|s| s.endpoint.clone()),
            latest_handshake_at: stats.and_then(|s| s.last_handshake),
            transfer_rx: stats.map(|s| s.rx_bytes).unwrap_or(0),
            transfer_tx: stats.map(|s| s.tx_bytes).unwrap_or(0),
            persistent_keepalive: stats.and_then(|s| s.persistent_keepalive),
        }
    }
}

/// Result of applying an edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub diff: EditDiff,
    /// Commit + sync rounds performed
    pub steps: usize,
}

/// Overall manager status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub interface: String,
    pub backend: String,
    pub subnet: String,
    pub peers: usize,
    pub connections: usize,
    pub available_addresses: usize,
    pub sync: SyncState,
}

/// Mesh Manager - core orchestration service
pub struct MeshManager {
    config: MeshConfig,
    allocator: AddressAllocator,
    store: NetworkStore,
    sync: SyncEngine,
    /// Serializes every mutation, including its reconcile
    mutations: Mutex<()>,
    init: OnceCell<()>,
}

impl MeshManager {
    /// Create a manager using the backend named in `config`
    pub fn new(config: MeshConfig) -> Result<Self> {
        let backend = create_backend(config.backend);
        Self::with_backend(config, backend)
    }

    /// Create a manager driving the given backend
    pub fn with_backend(config: MeshConfig, backend: Arc<dyn WireGuardBackend>) -> Result<Self> {
        config.validate()?;

        let sync = SyncEngine::new(
            backend,
            NetworkStorage::new(&config.state_dir, &config.interface),
            ConfigRenderer::new(&config),
            &config.interface,
            config.sync_timeout(),
        );

        Ok(Self {
            allocator: AddressAllocator::new(config.subnet),
            store: NetworkStore::default(),
            sync,
            mutations: Mutex::new(()),
            init: OnceCell::new(),
            config,
        })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn renderer(&self) -> &ConfigRenderer {
        self.sync.renderer()
    }

    // ==================== Lifecycle ====================

    /// Load or bootstrap the network and start the interface, once
    ///
    /// Concurrent callers wait for the same initialization. A failed
    /// initialization is retried by the next caller.
    pub async fn init(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                let network = match self.sync.storage().load()? {
                    Some(network) => {
                        network.validate()?;
                        for peer in network.peers.values() {
                            WireGuardKeys::check_pair(&peer.private_key, &peer.public_key)
                                .map_err(|e| {
                                    Error::InvalidModel(format!("peer '{}': {}", peer.id, e))
                                })?;
                        }
                        network
                    }
                    None => {
                        info!("No network found, creating root peer");
                        self.bootstrap()
                    }
                };
                self.store.commit(network.clone())?;

                match self.sync.startup(&network).await {
                    Ok(()) => {}
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "Interface started without a clean reconcile");
                    }
                    Err(e) => return Err(e),
                }

                info!(
                    interface = %self.config.interface,
                    peers = network.peers.len(),
                    "Mesh manager initialized"
                );
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Whether `init` has completed
    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Take the interface down; durable state is kept
    pub async fn shutdown(&self) -> Result<()> {
        if !self.is_initialized() {
            return Ok(());
        }
        let _guard = self.mutations.lock().await;
        self.sync.bring_down().await
    }

    fn bootstrap(&self) -> Network {
        let keys = KeyPair::generate();
        let now = Utc::now();
        Network::with_root(Peer {
            id: PeerId::root(),
            name: ROOT_PEER_NAME.to_string(),
            address: self.allocator.root_address(),
            public_key: keys.public_key_base64(),
            private_key: keys.private_key_base64(),
            mobility: Mobility::Static,
            endpoint: self.config.root_endpoint(),
            dns: InterfaceOverride::disabled(),
            mtu: InterfaceOverride::disabled(),
            created_at: now,
            updated_at: now,
        })
    }

    /// One commit + sync round; the caller holds the mutation lock
    ///
    /// Validation or persistence failures leave everything untouched. A
    /// reconcile failure is returned after the change is committed.
    async fn commit_step<F>(&self, change: F) -> Result<Arc<Network>>
    where
        F: FnOnce(&mut Network) -> Result<()>,
    {
        let mut next = (*self.store.snapshot()).clone();
        change(&mut next)?;
        next.validate()?;

        let rendered = self.sync.persist(&next)?;
        let committed = self.store.commit(next)?;
        self.sync.reconcile(&rendered).await?;
        Ok(committed)
    }

    async fn mutate<F>(&self, change: F) -> Result<Arc<Network>>
    where
        F: FnOnce(&mut Network) -> Result<()>,
    {
        self.init().await?;
        let _guard = self.mutations.lock().await;
        self.commit_step(change).await
    }

    // ==================== Read Operations ====================

    /// Snapshot of the current network
    pub async fn network(&self) -> Result<Arc<Network>> {
        self.init().await?;
        Ok(self.store.snapshot())
    }

    /// All peers, with live telemetry where the interface reports it
    pub async fn list_peers(&self) -> Result<Vec<PeerSummary>> {
        let network = self.network().await?;

        let stats: HashMap<String, PeerStats> = match self.sync.dump().await {
            Ok(stats) => stats
                .into_iter()
                .map(|s| (s.public_key.clone(), s))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Live telemetry unavailable");
                HashMap::new()
            }
        };

        Ok(network
            .peers
            .values()
            .map(|peer| PeerSummary::new(&network, peer, stats.get(&peer.public_key)))
            .collect())
    }

    pub async fn get_peer(&self, peer_id: &PeerId) -> Result<PeerSummary> {
        let network = self.network().await?;
        let peer = network.peer(peer_id)?;
        Ok(PeerSummary::new(&network, peer, None))
    }

    /// Working copy for an edit form
    pub async fn peer_edit(&self, peer_id: &PeerId) -> Result<PeerEdit> {
        let network = self.network().await?;
        PeerEdit::from_network(&network, peer_id)
    }

    /// Client configuration file for `peer_id`
    pub async fn peer_config(&self, peer_id: &PeerId) -> Result<String> {
        let network = self.network().await?;
        self.renderer().render_peer(&network, peer_id)
    }

    /// Client configuration as an SVG QR code
    pub async fn peer_qr_svg(&self, peer_id: &PeerId) -> Result<String> {
        let config = self.peer_config(peer_id).await?;
        let code = QrCode::new(config.as_bytes())
            .map_err(|e| Error::Internal(format!("Cannot encode QR code: {}", e)))?;
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(256, 256)
            .build())
    }

    /// Id and address the next created peer would get
    pub async fn preamble(&self) -> Result<Preamble> {
        let network = self.network().await?;
        Ok(Preamble {
            peer_id: PeerId::generate(),
            address: self.allocator.allocate(&network)?,
            subnet: self.allocator.subnet().to_string(),
        })
    }

    /// Server configuration as currently rendered
    pub async fn server_config(&self) -> Result<String> {
        let network = self.network().await?;
        self.renderer().render_server(&network)
    }

    // ==================== Peer Operations ====================

    /// Create a peer attached to at least one existing peer
    pub async fn create_peer(&self, request: CreatePeerRequest) -> Result<Peer> {
        let name = validate_name(&request.name)?;
        validate_peer_count(request.attached.len())?;
        let endpoint = match request.mobility {
            Mobility::Static => validate_endpoint(&request.endpoint)?,
            Mobility::Roaming => String::new(),
        };
        let dns = validate_dns(&request.dns)?;
        let mtu = validate_mtu(&request.mtu)?;

        let peer_id = match request.id.clone() {
            Some(id) => {
                validate_peer_id(&id)?;
                id
            }
            None => PeerId::generate(),
        };

        let mut attachments = Vec::with_capacity(request.attached.len());
        for attached in &request.attached {
            let new_to_old =
                validate_allowed_ips("allowed_ips_new_to_old", &attached.allowed_ips_new_to_old)?;
            let old_to_new =
                validate_allowed_ips("allowed_ips_old_to_new", &attached.allowed_ips_old_to_new)?;
            let keepalive = validate_keepalive(
                attached
                    .persistent_keepalive
                    .unwrap_or_else(|| self.default_keepalive()),
            )?;
            attachments.push((attached, new_to_old, old_to_new, keepalive));
        }

        let keys = KeyPair::generate();
        let mut created = None;

        self.mutate(|network| {
            if network.peers.contains_key(&peer_id) {
                return Err(Error::validation(
                    "id",
                    format!("peer '{}' already exists", peer_id),
                ));
            }

            let address = match request.address.as_deref() {
                Some(address) => {
                    validate_address(address, self.allocator.subnet(), network, None)?
                }
                None => self.allocator.allocate(network)?,
            };

            let now = Utc::now();
            let peer = Peer {
                id: peer_id.clone(),
                name,
                address,
                public_key: keys.public_key_base64(),
                private_key: keys.private_key_base64(),
                mobility: request.mobility,
                endpoint,
                dns,
                mtu,
                created_at: now,
                updated_at: now,
            };

            for (attached, new_to_old, old_to_new, keepalive) in attachments {
                if attached.peer == peer_id {
                    return Err(Error::validation(
                        "attached",
                        "a peer cannot be attached to itself",
                    ));
                }
                network.peer_mut(&attached.peer)?.touch();

                let id = ConnectionId::new(peer_id.clone(), attached.peer.clone());
                if network.connections.contains_key(&id) {
                    return Err(Error::validation(
                        "attached",
                        format!("peer '{}' is attached twice", attached.peer),
                    ));
                }
                let (a_to_b, b_to_a) = if id.a() == &peer_id {
                    (new_to_old, old_to_new)
                } else {
                    (old_to_new, new_to_old)
                };
                network.connections.insert(
                    id.clone(),
                    Connection {
                        id,
                        preshared_key: WireGuardKeys::generate_preshared_key(),
                        enabled: attached.enabled,
                        allowed_ips_a_to_b: a_to_b,
                        allowed_ips_b_to_a: b_to_a,
                        persistent_keepalive: keepalive,
                    },
                );
            }

            network.peers.insert(peer_id.clone(), peer.clone());
            created = Some(peer);
            Ok(())
        })
        .await
        .map_err(|e| log_mutation_error("create_peer", e))?;

        let peer = created.ok_or_else(|| Error::Internal("peer was not created".to_string()))?;
        info!(
            peer_id = %peer.id,
            name = %peer.name,
            address = %peer.address,
            public_key = %WireGuardKeys::format_key_short(&peer.public_key),
            "Created peer"
        );
        Ok(peer)
    }

    /// Delete a peer and every connection touching it
    pub async fn delete_peer(&self, peer_id: &PeerId) -> Result<()> {
        if peer_id.is_root() {
            return Err(Error::InvalidModel(
                "the root peer cannot be deleted".to_string(),
            ));
        }

        self.mutate(|network| {
            let others: Vec<PeerId> = network
                .connections_of(peer_id)
                .filter_map(|conn| conn.id.other(peer_id).cloned())
                .collect();
            network.remove_peer(peer_id)?;
            for other in others {
                network.peer_mut(&other)?.touch();
            }
            Ok(())
        })
        .await?;

        info!(peer_id = %peer_id, "Deleted peer");
        Ok(())
    }

    /// Enable every connection of a peer
    pub async fn enable_peer(&self, peer_id: &PeerId) -> Result<()> {
        self.set_peer_enabled(peer_id, true).await
    }

    /// Disable every connection of a peer
    pub async fn disable_peer(&self, peer_id: &PeerId) -> Result<()> {
        self.set_peer_enabled(peer_id, false).await
    }

    async fn set_peer_enabled(&self, peer_id: &PeerId, enabled: bool) -> Result<()> {
        self.mutate(|network| {
            network.peer_mut(peer_id)?.touch();
            let ids: Vec<ConnectionId> = network
                .connections_of(peer_id)
                .map(|conn| conn.id.clone())
                .collect();
            for id in ids {
                network.connection_mut(&id)?.enabled = enabled;
            }
            Ok(())
        })
        .await?;

        info!(peer_id = %peer_id, enabled, "Toggled peer connections");
        Ok(())
    }

    pub async fn update_peer_name(&self, peer_id: &PeerId, name: &str) -> Result<ApplyOutcome> {
        let mut edit = self.peer_edit(peer_id).await?;
        edit.name = name.to_string();
        self.apply_edit(peer_id, edit).await
    }

    pub async fn update_peer_address(
        &self,
        peer_id: &PeerId,
        address: &str,
    ) -> Result<ApplyOutcome> {
        let mut edit = self.peer_edit(peer_id).await?;
        edit.address = address.to_string();
        self.apply_edit(peer_id, edit).await
    }

    // ==================== Connection Operations ====================

    pub async fn create_connection(&self, request: CreateConnectionRequest) -> Result<Connection> {
        if request.from == request.to {
            return Err(Error::validation("to", "a peer cannot connect to itself"));
        }
        let from_to = validate_allowed_ips("allowed_ips_from_to", &request.allowed_ips_from_to)?;
        let to_from = validate_allowed_ips("allowed_ips_to_from", &request.allowed_ips_to_from)?;
        let keepalive = validate_keepalive(
            request
                .persistent_keepalive
                .unwrap_or_else(|| self.default_keepalive()),
        )?;

        let id = ConnectionId::new(request.from.clone(), request.to.clone());
        let (a_to_b, b_to_a) = if id.a() == &request.from {
            (from_to, to_from)
        } else {
            (to_from, from_to)
        };
        let connection = Connection {
            id: id.clone(),
            preshared_key: WireGuardKeys::generate_preshared_key(),
            enabled: request.enabled,
            allowed_ips_a_to_b: a_to_b,
            allowed_ips_b_to_a: b_to_a,
            persistent_keepalive: keepalive,
        };

        let inserted = connection.clone();
        self.mutate(move |network| {
            if network.connections.contains_key(&id) {
                return Err(Error::InvalidModel(format!("connection {} already exists", id)));
            }
            network.peer_mut(id.a())?.touch();
            network.peer_mut(id.b())?.touch();
            network.connections.insert(id, inserted);
            Ok(())
        })
        .await?;

        info!(connection = %connection.id, "Created connection");
        Ok(connection)
    }

    pub async fn delete_connection(&self, id: &ConnectionId) -> Result<()> {
        self.mutate(|network| {
            network
                .connections
                .remove(id)
                .ok_or_else(|| Error::ConnectionNotFound(id.clone()))?;
            network.peer_mut(id.a())?.touch();
            network.peer_mut(id.b())?.touch();
            Ok(())
        })
        .await?;

        info!(connection = %id, "Deleted connection");
        Ok(())
    }

    pub async fn set_connection_enabled(&self, id: &ConnectionId, enabled: bool) -> Result<()> {
        self.mutate(|network| {
            network.connection_mut(id)?.enabled = enabled;
            network.peer_mut(id.a())?.touch();
            network.peer_mut(id.b())?.touch();
            Ok(())
        })
        .await?;

        info!(connection = %id, enabled, "Toggled connection");
        Ok(())
    }

    // ==================== Edit Protocol ====================

    /// Validate `edit` against the current network without applying it
    pub async fn diff_edit(&self, peer_id: &PeerId, edit: PeerEdit) -> Result<EditDiff> {
        let network = self.network().await?;
        let mut session = EditSession::open(&network, peer_id)?;
        session.replace_working(edit)?;
        session.validate(&network, self.allocator.subnet())
    }

    /// Diff `edit` and apply it in order: peer fields, added connections,
    /// removed connections, changed connections
    ///
    /// Each non-empty step is its own commit + sync. An empty diff touches
    /// nothing.
    pub async fn apply_edit(&self, peer_id: &PeerId, edit: PeerEdit) -> Result<ApplyOutcome> {
        self.init().await?;
        let _guard = self.mutations.lock().await;

        let network = self.store.snapshot();
        let mut session = EditSession::open(&network, peer_id)?;
        session.replace_working(edit)?;
        let diff = session.validate(&network, self.allocator.subnet())?;

        if diff.is_empty() {
            debug!(peer_id = %peer_id, "Edit has no changes");
            return Ok(ApplyOutcome { diff, steps: 0 });
        }

        session.begin_apply()?;
        let mut steps = 0;

        if !diff.peer_changes.is_empty() {
            self.commit_step(|network| {
                let peer = network.peer_mut(peer_id)?;
                for change in &diff.peer_changes {
                    apply_peer_change(peer, change);
                }
                peer.touch();
                Ok(())
            })
            .await?;
            steps += 1;
        }

        if !diff.added.is_empty() {
            self.commit_step(|network| {
                for added in &diff.added {
                    network.connections.insert(
                        added.id.clone(),
                        Connection {
                            id: added.id.clone(),
                            preshared_key: WireGuardKeys::generate_preshared_key(),
                            enabled: added.enabled,
                            allowed_ips_a_to_b: added.allowed_ips_a_to_b.clone(),
                            allowed_ips_b_to_a: added.allowed_ips_b_to_a.clone(),
                            persistent_keepalive: added.persistent_keepalive,
                        },
                    );
                }
                network.peer_mut(peer_id)?.touch();
                Ok(())
            })
            .await?;
            steps += 1;
        }

        if !diff.removed.is_empty() {
            self.commit_step(|network| {
                for id in &diff.removed {
                    network
                        .connections
                        .remove(id)
                        .ok_or_else(|| Error::ConnectionNotFound(id.clone()))?;
                }
                network.peer_mut(peer_id)?.touch();
                Ok(())
            })
            .await?;
            steps += 1;
        }

        if !diff.changed.is_empty() {
            self.commit_step(|network| {
                for change in &diff.changed {
                    let conn = network.connection_mut(&change.id)?;
                    for field in &change.changes {
                        apply_connection_change(conn, field);
                    }
                }
                network.peer_mut(peer_id)?.touch();
                Ok(())
            })
            .await?;
            steps += 1;
        }

        session.finish_apply(&self.store.snapshot())?;
        info!(peer_id = %peer_id, steps, "Applied edit");
        Ok(ApplyOutcome { diff, steps })
    }

    // ==================== Server Operations ====================

    pub async fn server_status(&self) -> Result<InterfaceStatus> {
        self.init().await?;
        self.sync.interface_status().await
    }

    /// Bring the interface up from the persisted configuration
    pub async fn server_up(&self) -> Result<()> {
        self.init().await?;
        let _guard = self.mutations.lock().await;
        self.sync.bring_up().await
    }

    pub async fn server_down(&self) -> Result<()> {
        self.init().await?;
        let _guard = self.mutations.lock().await;
        self.sync.bring_down().await
    }

    /// Re-persist and reconcile the current network
    pub async fn resync(&self) -> Result<()> {
        self.init().await?;
        let _guard = self.mutations.lock().await;
        let network = self.store.snapshot();
        self.sync.sync(&network).await?;
        info!("Resynced interface");
        Ok(())
    }

    pub async fn status(&self) -> Result<ManagerStatus> {
        let network = self.network().await?;
        Ok(ManagerStatus {
            interface: self.config.interface.clone(),
            backend: self.sync.backend().backend_type().to_string(),
            subnet: self.allocator.subnet().to_string(),
            peers: network.peers.len(),
            connections: network.connections.len(),
            available_addresses: self.allocator.available(&network),
            sync: self.sync.state(),
        })
    }

    fn default_keepalive(&self) -> PersistentKeepalive {
        PersistentKeepalive {
            enabled: self.config.default_keepalive > 0,
            value: self.config.default_keepalive,
        }
    }
}

fn apply_peer_change(peer: &mut Peer, change: &PeerFieldChange) {
    match change {
        PeerFieldChange::Name(name) => peer.name = name.clone(),
        PeerFieldChange::Address(address) => peer.address = *address,
        PeerFieldChange::Mobility(mobility) => peer.mobility = *mobility,
        PeerFieldChange::Endpoint(endpoint) => peer.endpoint = endpoint.clone(),
        PeerFieldChange::Dns(dns) => peer.dns = dns.clone(),
        PeerFieldChange::Mtu(mtu) => peer.mtu = mtu.clone(),
    }
}

fn apply_connection_change(conn: &mut Connection, change: &ConnectionFieldChange) {
    match change {
        ConnectionFieldChange::Enabled(enabled) => conn.enabled = *enabled,
        ConnectionFieldChange::AllowedIpsAToB(ips) => conn.allowed_ips_a_to_b = ips.clone(),
        ConnectionFieldChange::AllowedIpsBToA(ips) => conn.allowed_ips_b_to_a = ips.clone(),
        ConnectionFieldChange::PersistentKeepalive(keepalive) => {
            conn.persistent_keepalive = *keepalive
        }
    }
}

fn log_mutation_error(operation: &str, e: Error) -> Error {
    match &e {
        Error::Sync(_) => warn!(operation, error = %e, "Committed, but live interface is behind"),
        _ => debug!(operation, error = %e, "Mutation rejected"),
    }
    e
}
