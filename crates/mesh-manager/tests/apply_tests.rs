//! End-to-end mutation tests
//!
//! These drive the manager against the in-memory backend and check the
//! three places a change must land: the committed network, the files on
//! disk and the running interface config.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use mesh_manager::models::{InterfaceOverride, Mobility, PeerId};
use mesh_manager::storage::NetworkStorage;
use mesh_manager::wireguard::parse_peer_blocks;
use mesh_manager::{
    AttachedPeer, CreatePeerRequest, Error, MemoryBackend, MeshConfig, MeshManager, Peer,
};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    _dir: TempDir,
    config: MeshConfig,
    backend: Arc<MemoryBackend>,
    manager: Arc<MeshManager>,
}

async fn harness_with(configure: impl FnOnce(&mut MeshConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = MeshConfig {
        host: "vpn.example.com".into(),
        state_dir: dir.path().to_path_buf(),
        ..MeshConfig::default()
    };
    configure(&mut config);

    let backend = Arc::new(MemoryBackend::new());
    let manager = Arc::new(MeshManager::with_backend(config.clone(), backend.clone()).unwrap());
    manager.init().await.unwrap();

    Harness {
        _dir: dir,
        config,
        backend,
        manager,
    }
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

fn roaming_peer(name: &str, attached: Vec<AttachedPeer>) -> CreatePeerRequest {
    CreatePeerRequest {
        id: None,
        name: name.to_string(),
        address: None,
        mobility: Mobility::Roaming,
        endpoint: String::new(),
        dns: InterfaceOverride::disabled(),
        mtu: InterfaceOverride::disabled(),
        attached,
    }
}

fn attach(peer: PeerId) -> AttachedPeer {
    AttachedPeer {
        peer,
        enabled: true,
        allowed_ips_new_to_old: "10.8.0.0/24".into(),
        allowed_ips_old_to_new: "10.8.0.0/24".into(),
        persistent_keepalive: None,
    }
}

async fn create_on_root(manager: &MeshManager, name: &str) -> Peer {
    manager
        .create_peer(roaming_peer(name, vec![attach(PeerId::root())]))
        .await
        .unwrap()
}

fn public_keys(rendered: &str) -> BTreeSet<String> {
    parse_peer_blocks(rendered)
        .unwrap()
        .into_iter()
        .map(|peer| peer.public_key)
        .collect()
}

// ============================================================================
// Creation and deletion
// ============================================================================

#[tokio::test]
async fn test_first_peer_gets_second_address() {
    let h = harness().await;

    let alice = create_on_root(&h.manager, "alice").await;
    assert_eq!(alice.address.to_string(), "10.8.0.2");

    let server = h.manager.server_config().await.unwrap();
    assert!(server.contains(&format!("PublicKey = {}", alice.public_key)));
    assert_eq!(h.backend.running_config(&h.config.interface), Some(server));

    let err = h.manager.delete_peer(&PeerId::root()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidModel(_)));
    assert!(h.manager.network().await.unwrap().root().is_some());
}

#[tokio::test]
async fn test_delete_peer_removes_its_connections() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let bob = h
        .manager
        .create_peer(roaming_peer(
            "bob",
            vec![attach(PeerId::root()), attach(alice.id.clone())],
        ))
        .await
        .unwrap();

    h.manager.delete_peer(&bob.id).await.unwrap();

    let network = h.manager.network().await.unwrap();
    assert!(!network.peers.contains_key(&bob.id));
    assert!(network.connections.keys().all(|id| !id.contains(&bob.id)));
    assert_eq!(network.connections.len(), 1);

    let err = h.manager.delete_peer(&bob.id).await.unwrap_err();
    assert!(matches!(err, Error::PeerNotFound(_)));
}

#[tokio::test]
async fn test_allocation_exhaustion() {
    let h = harness_with(|config| config.subnet = "10.9.0.0/30".parse().unwrap()).await;

    let mut only = roaming_peer("only", vec![attach(PeerId::root())]);
    only.attached[0].allowed_ips_new_to_old = "10.9.0.0/30".into();
    only.attached[0].allowed_ips_old_to_new = "10.9.0.2/32".into();
    let only = h.manager.create_peer(only).await.unwrap();
    assert_eq!(only.address.to_string(), "10.9.0.2");

    let reconciles = h.backend.reconcile_calls();
    let mut extra = roaming_peer("extra", vec![attach(PeerId::root())]);
    extra.attached[0].allowed_ips_new_to_old = "10.9.0.0/30".into();
    extra.attached[0].allowed_ips_old_to_new = "10.9.0.0/30".into();
    let err = h.manager.create_peer(extra).await.unwrap_err();

    assert!(matches!(err, Error::AddressSpaceExhausted(_)));
    assert_eq!(h.backend.reconcile_calls(), reconciles);
    assert_eq!(h.manager.network().await.unwrap().peers.len(), 2);
}

#[tokio::test]
async fn test_multiline_name_is_rejected() {
    let h = harness().await;
    let before = h.manager.server_config().await.unwrap();

    let err = h
        .manager
        .create_peer(roaming_peer(
            "evil\n[Interface]\nPostUp = touch /tmp/owned #",
            vec![attach(PeerId::root())],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.field(), Some("name"));

    let alice = create_on_root(&h.manager, "alice").await;
    let err = h
        .manager
        .update_peer_name(&alice.id, "alice\r\nPostDown = reboot")
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("name"));

    let server = h.manager.server_config().await.unwrap();
    assert!(!server.contains("PostUp = touch"));
    assert!(!server.contains("PostDown = reboot"));
    assert_eq!(server.lines().filter(|line| *line == "[Interface]").count(), 1);
    assert_ne!(server, before);
}

#[tokio::test]
async fn test_client_peer_id_must_be_a_uuid() {
    let h = harness().await;
    let reconciles = h.backend.reconcile_calls();

    for bad in ["", "x\ny", "alice", "root"] {
        let mut request = roaming_peer("alice", vec![attach(PeerId::root())]);
        request.id = Some(PeerId::new(bad));
        let err = h.manager.create_peer(request).await.unwrap_err();
        assert_eq!(err.field(), Some("id"), "{:?}", bad);
    }
    assert_eq!(h.backend.reconcile_calls(), reconciles);
    assert_eq!(h.manager.network().await.unwrap().peers.len(), 1);

    let preamble = h.manager.preamble().await.unwrap();
    let mut request = roaming_peer("alice", vec![attach(PeerId::root())]);
    request.id = Some(preamble.peer_id.clone());
    let alice = h.manager.create_peer(request).await.unwrap();
    assert_eq!(alice.id, preamble.peer_id);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_addresses() {
    let h = harness().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            create_on_root(&manager, &format!("peer-{}", i)).await
        }));
    }

    let mut addresses = BTreeSet::new();
    for handle in handles {
        addresses.insert(handle.await.unwrap().address);
    }
    assert_eq!(addresses.len(), 8);

    let network = h.manager.network().await.unwrap();
    assert_eq!(network.peers.len(), 9);
    network.validate().unwrap();
}

// ============================================================================
// Edit protocol
// ============================================================================

#[tokio::test]
async fn test_disabled_connection_is_kept_but_not_rendered() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let bob = h
        .manager
        .create_peer(roaming_peer(
            "bob",
            vec![attach(PeerId::root()), attach(alice.id.clone())],
        ))
        .await
        .unwrap();

    let mut edit = h.manager.peer_edit(&bob.id).await.unwrap();
    edit.connections
        .iter_mut()
        .find(|conn| conn.peer == alice.id)
        .unwrap()
        .enabled = false;
    let outcome = h.manager.apply_edit(&bob.id, edit).await.unwrap();
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.diff.changed.len(), 1);

    let alice_conf = h.manager.peer_config(&alice.id).await.unwrap();
    let bob_conf = h.manager.peer_config(&bob.id).await.unwrap();
    assert!(!alice_conf.contains(&bob.public_key));
    assert!(!bob_conf.contains(&alice.public_key));
    // Root link is untouched
    assert!(bob_conf.contains("vpn.example.com:51820"));

    let network = h.manager.network().await.unwrap();
    let link = network
        .connections
        .values()
        .find(|conn| conn.id.contains(&alice.id) && conn.id.contains(&bob.id))
        .unwrap();
    assert!(!link.enabled);
}

#[tokio::test]
async fn test_duplicate_address_is_rejected_without_side_effects() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let carol = create_on_root(&h.manager, "carol").await;

    let before = h.manager.network().await.unwrap();
    let reconciles = h.backend.reconcile_calls();

    let mut edit = h.manager.peer_edit(&alice.id).await.unwrap();
    edit.address = carol.address.to_string();
    edit.name = "alice-renamed".into();
    let err = h.manager.apply_edit(&alice.id, edit).await.unwrap_err();

    assert_eq!(err.field(), Some("address"));
    assert_eq!(h.backend.reconcile_calls(), reconciles);
    assert_eq!(*h.manager.network().await.unwrap(), *before);
}

#[tokio::test]
async fn test_empty_edit_touches_nothing() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let reconciles = h.backend.reconcile_calls();

    let edit = h.manager.peer_edit(&alice.id).await.unwrap();
    let outcome = h.manager.apply_edit(&alice.id, edit).await.unwrap();

    assert_eq!(outcome.steps, 0);
    assert!(outcome.diff.is_empty());
    assert_eq!(h.backend.reconcile_calls(), reconciles);
}

#[tokio::test]
async fn test_edit_adds_and_removes_connections_in_one_apply() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let bob = create_on_root(&h.manager, "bob").await;

    let mut edit = h.manager.peer_edit(&alice.id).await.unwrap();
    edit.name = "alice-laptop".into();
    edit.connections.retain(|conn| conn.peer != PeerId::root());
    edit.connections.push(mesh_manager::edit::ConnectionEdit {
        peer: bob.id.clone(),
        enabled: true,
        allowed_ips_to_peer: format!("{}/32", bob.address),
        allowed_ips_from_peer: format!("{}/32", alice.address),
        persistent_keepalive: Default::default(),
    });

    let reconciles = h.backend.reconcile_calls();
    let outcome = h.manager.apply_edit(&alice.id, edit).await.unwrap();
    assert_eq!(outcome.steps, 3);
    assert_eq!(h.backend.reconcile_calls(), reconciles + 3);

    let network = h.manager.network().await.unwrap();
    let alice_links: Vec<_> = network.connections_of(&alice.id).collect();
    assert_eq!(alice_links.len(), 1);
    assert!(alice_links[0].id.contains(&bob.id));
    assert_eq!(network.peer(&alice.id).unwrap().name, "alice-laptop");

    let server = h.manager.server_config().await.unwrap();
    assert!(!server.contains(&alice.public_key));
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_server_render_lists_enabled_root_links() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let bob = create_on_root(&h.manager, "bob").await;
    let carol = create_on_root(&h.manager, "carol").await;
    h.manager.disable_peer(&bob.id).await.unwrap();

    let rendered = h.manager.server_config().await.unwrap();
    let expected: BTreeSet<String> = [alice.public_key, carol.public_key].into_iter().collect();
    assert_eq!(public_keys(&rendered), expected);

    h.manager.enable_peer(&bob.id).await.unwrap();
    let rendered = h.manager.server_config().await.unwrap();
    assert!(public_keys(&rendered).contains(&bob.public_key));
}

#[tokio::test]
async fn test_static_peer_endpoint_in_others_configs() {
    let h = harness().await;
    let mut edge = roaming_peer("edge", vec![attach(PeerId::root())]);
    edge.mobility = Mobility::Static;
    edge.endpoint = "edge.example.net:51830".into();
    let edge = h.manager.create_peer(edge).await.unwrap();

    let alice = h
        .manager
        .create_peer(roaming_peer(
            "alice",
            vec![attach(PeerId::root()), attach(edge.id.clone())],
        ))
        .await
        .unwrap();

    let alice_conf = h.manager.peer_config(&alice.id).await.unwrap();
    assert!(alice_conf.contains("Endpoint = edge.example.net:51830"));

    let edge_conf = h.manager.peer_config(&edge.id).await.unwrap();
    assert!(edge_conf.contains("ListenPort = 51830"));
}

// ============================================================================
// Sync failures
// ============================================================================

#[tokio::test]
async fn test_failed_reconcile_keeps_committed_state() {
    let h = harness().await;
    h.backend.fail_reconciles(1);

    let err = h
        .manager
        .create_peer(roaming_peer("alice", vec![attach(PeerId::root())]))
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let network = h.manager.network().await.unwrap();
    assert_eq!(network.peers.len(), 2);

    let status = h.manager.status().await.unwrap();
    assert_eq!(status.sync.failure_count, 1);

    h.manager.resync().await.unwrap();
    let running = h.backend.running_config(&h.config.interface).unwrap();
    assert_eq!(running, h.manager.server_config().await.unwrap());
}

#[tokio::test]
async fn test_reconcile_timeout_is_a_sync_error() {
    let h = harness_with(|config| config.sync_timeout_secs = 1).await;
    h.backend
        .set_reconcile_delay(Some(Duration::from_millis(1500)));

    let err = h
        .manager
        .create_peer(roaming_peer("slow", vec![attach(PeerId::root())]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Sync(_)));
}

#[tokio::test]
async fn test_interrupted_apply_keeps_finished_steps() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    let bob = create_on_root(&h.manager, "bob").await;

    let mut edit = h.manager.peer_edit(&alice.id).await.unwrap();
    edit.name = "alice-laptop".into();
    edit.connections.push(mesh_manager::edit::ConnectionEdit {
        peer: bob.id.clone(),
        enabled: true,
        allowed_ips_to_peer: format!("{}/32", bob.address),
        allowed_ips_from_peer: format!("{}/32", alice.address),
        persistent_keepalive: Default::default(),
    });

    // The name step commits, then its reconcile fails and the apply stops
    h.backend.fail_reconciles(1);
    let err = h.manager.apply_edit(&alice.id, edit.clone()).await.unwrap_err();
    assert!(err.is_retryable());

    let network = h.manager.network().await.unwrap();
    assert_eq!(network.peer(&alice.id).unwrap().name, "alice-laptop");
    assert_eq!(network.connections_of(&alice.id).count(), 1);

    let remaining = h.manager.diff_edit(&alice.id, edit.clone()).await.unwrap();
    assert!(remaining.peer_changes.is_empty());
    assert_eq!(remaining.added.len(), 1);
    assert!(remaining.removed.is_empty());
    assert!(remaining.changed.is_empty());

    let outcome = h.manager.apply_edit(&alice.id, edit.clone()).await.unwrap();
    assert_eq!(outcome.steps, 1);
    assert!(h.manager.diff_edit(&alice.id, edit).await.unwrap().is_empty());

    let running = h.backend.running_config(&h.config.interface).unwrap();
    assert_eq!(running, h.manager.server_config().await.unwrap());
}

#[tokio::test]
async fn test_hung_bring_up_does_not_block_mutations() {
    let h = harness_with(|config| config.sync_timeout_secs = 1).await;
    h.backend.set_lifecycle_delay(Some(Duration::from_secs(60)));

    let manager = h.manager.clone();
    let up = tokio::spawn(async move { manager.server_up().await });

    let created = tokio::time::timeout(
        Duration::from_secs(5),
        h.manager
            .create_peer(roaming_peer("alice", vec![attach(PeerId::root())])),
    )
    .await
    .expect("create_peer waited on a stuck bring up");
    created.unwrap();

    let up = tokio::time::timeout(Duration::from_secs(5), up)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(up, Err(Error::Sync(_))));
}

#[tokio::test]
async fn test_disk_matches_committed_network() {
    let h = harness().await;
    let alice = create_on_root(&h.manager, "alice").await;
    h.manager
        .update_peer_name(&alice.id, "alice-phone")
        .await
        .unwrap();

    let storage = NetworkStorage::new(&h.config.state_dir, &h.config.interface);
    let stored = storage.load().unwrap().unwrap();
    assert_eq!(stored, *h.manager.network().await.unwrap());

    let conf = std::fs::read_to_string(storage.config_path()).unwrap();
    assert_eq!(conf, h.manager.server_config().await.unwrap());
}
