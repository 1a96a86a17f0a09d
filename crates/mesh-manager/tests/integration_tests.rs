//! Integration tests for the mesh-manager API
//!
//! Tests full API workflows: peer creation from a preamble, config
//! downloads, connection management and the edit diff/apply round trip.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use mesh_manager::api::{create_router, AppState};
use mesh_manager::{MemoryBackend, MeshConfig, MeshManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Helper to create a test app backed by a temp dir and the in-memory backend
fn create_test_app() -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    let config = MeshConfig {
        host: "vpn.example.com".into(),
        state_dir: dir.path().to_path_buf(),
        ..MeshConfig::default()
    };
    let manager = MeshManager::with_backend(config, Arc::new(MemoryBackend::new())).unwrap();
    let state = Arc::new(AppState::new(manager));
    (dir, create_router(state))
}

/// Helper to make a JSON request
fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Helper to extract JSON from response
async fn response_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

async fn response_text(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn send(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(method, uri, body))
        .await
        .unwrap()
}

/// Create a roaming peer attached to root, returning its JSON summary
async fn create_peer(app: &axum::Router, name: &str) -> Value {
    let preamble = response_json(send(app, Method::GET, "/api/v1/peers/preamble", None).await).await;
    let address = preamble["address"].as_str().unwrap().to_string();

    let body = json!({
        "id": preamble["peer_id"],
        "name": name,
        "address": address,
        "attached": [{
            "peer": "root",
            "allowed_ips_new_to_old": "10.8.0.0/24",
            "allowed_ips_old_to_new": format!("{}/32", address),
        }]
    });
    let response = send(app, Method::POST, "/api/v1/peers", Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (_dir, app) = create_test_app();

    let response = send(&app, Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_after_first_request() {
    let (_dir, app) = create_test_app();

    let response = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    send(&app, Method::GET, "/api/v1/status", None).await;

    let response = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Peer Tests
// ============================================================================

#[tokio::test]
async fn test_root_exists_on_first_run() {
    let (_dir, app) = create_test_app();

    let response = send(&app, Method::GET, "/api/v1/peers", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let peers = response_json(response).await;
    let peers = peers.as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["id"], "root");
    assert_eq!(peers[0]["name"], "this-server");
    assert_eq!(peers[0]["address"], "10.8.0.1");
    assert_eq!(peers[0]["endpoint"], "vpn.example.com:51820");
    assert!(peers[0].get("private_key").is_none());
}

#[tokio::test]
async fn test_create_peer_from_preamble() {
    let (_dir, app) = create_test_app();

    let peer = create_peer(&app, "alice").await;
    assert_eq!(peer["name"], "alice");
    assert_eq!(peer["address"], "10.8.0.2");
    assert_eq!(peer["connections"], 1);
    assert_eq!(peer["enabled_connections"], 1);

    let id = peer["id"].as_str().unwrap();
    let response = send(&app, Method::GET, &format!("/api/v1/peers/{}", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_peer_validation_error() {
    let (_dir, app) = create_test_app();

    let body = json!({
        "name": "bad",
        "attached": [{
            "peer": "root",
            "allowed_ips_new_to_old": "10.8.0.0",
            "allowed_ips_old_to_new": "10.8.0.2/32",
        }]
    });
    let response = send(&app, Method::POST, "/api/v1/peers", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["details"]["field"], "allowed_ips_new_to_old");
}

#[tokio::test]
async fn test_get_nonexistent_peer() {
    let (_dir, app) = create_test_app();

    let response = send(&app, Method::GET, "/api/v1/peers/ghost", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = response_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cannot_delete_root() {
    let (_dir, app) = create_test_app();

    let response = send(&app, Method::DELETE, "/api/v1/peers/root", None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_peer_config_and_qr_code() {
    let (_dir, app) = create_test_app();
    let peer = create_peer(&app, "alice").await;
    let id = peer["id"].as_str().unwrap();

    let response = send(&app, Method::GET, &format!("/api/v1/peers/{}/config", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains(".conf"));
    let config = response_text(response).await;
    assert!(config.contains("[Interface]"));
    assert!(config.contains("Address = 10.8.0.2/24"));
    assert!(config.contains("Endpoint = vpn.example.com:51820"));

    let response = send(&app, Method::GET, &format!("/api/v1/peers/{}/qrcode.svg", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    assert!(response_text(response).await.contains("<svg"));
}

#[tokio::test]
async fn test_rename_and_readdress_peer() {
    let (_dir, app) = create_test_app();
    let peer = create_peer(&app, "alice").await;
    let id = peer["id"].as_str().unwrap();

    let response = send(
        &app,
        Method::PUT,
        &format!("/api/v1/peers/{}/name", id),
        Some(json!({ "name": "alice-phone" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["steps"], 1);

    let response = send(
        &app,
        Method::PUT,
        &format!("/api/v1/peers/{}/address", id),
        Some(json!({ "address": "10.8.0.1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["details"]["field"], "address");

    let response = send(
        &app,
        Method::PUT,
        &format!("/api/v1/peers/{}/address", id),
        Some(json!({ "address": "10.8.0.50" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(send(&app, Method::GET, &format!("/api/v1/peers/{}", id), None).await).await;
    assert_eq!(json["name"], "alice-phone");
    assert_eq!(json["address"], "10.8.0.50");
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_connection_lifecycle() {
    let (_dir, app) = create_test_app();
    let alice = create_peer(&app, "alice").await;
    let bob = create_peer(&app, "bob").await;
    let (a, b) = (alice["id"].as_str().unwrap(), bob["id"].as_str().unwrap());

    let body = json!({
        "from": a,
        "to": b,
        "allowed_ips_from_to": "10.8.0.3/32",
        "allowed_ips_to_from": "10.8.0.2/32",
    });
    let response = send(&app, Method::POST, "/api/v1/connections", Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, Method::POST, "/api/v1/connections", Some(body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Path order does not matter
    let response = send(
        &app,
        Method::POST,
        &format!("/api/v1/connections/{}/{}/disable", b, a),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let network = response_json(send(&app, Method::GET, "/api/v1/network", None).await).await;
    let link = network["connections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["a"] != "root")
        .unwrap()
        .clone();
    assert_eq!(link["enabled"], false);
    assert!(link.get("preshared_key").is_none());

    let response = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/connections/{}/{}", a, b),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/connections/{}/{}", a, b),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Edit Protocol Tests
// ============================================================================

#[tokio::test]
async fn test_edit_diff_then_apply() {
    let (_dir, app) = create_test_app();
    let alice = create_peer(&app, "alice").await;
    let id = alice["id"].as_str().unwrap();

    let response = send(&app, Method::GET, &format!("/api/v1/peers/{}/edit", id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut edit = response_json(response).await;
    edit["mtu"] = json!({ "enabled": true, "value": "1420" });
    edit["connections"][0]["persistent_keepalive"] = json!({ "enabled": true, "value": 15 });

    let response = send(
        &app,
        Method::POST,
        &format!("/api/v1/peers/{}/diff", id),
        Some(edit.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let diff = response_json(response).await;
    assert_eq!(diff["peer_changes"].as_array().unwrap().len(), 1);
    assert_eq!(diff["changed"].as_array().unwrap().len(), 1);

    // Diff is a dry run
    let config = response_text(
        send(&app, Method::GET, &format!("/api/v1/peers/{}/config", id), None).await,
    )
    .await;
    assert!(!config.contains("MTU = 1420"));

    let response = send(
        &app,
        Method::POST,
        &format!("/api/v1/peers/{}/apply", id),
        Some(edit),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["steps"], 2);

    let config = response_text(
        send(&app, Method::GET, &format!("/api/v1/peers/{}/config", id), None).await,
    )
    .await;
    assert!(config.contains("MTU = 1420"));
    assert!(config.contains("PersistentKeepalive = 15"));
}

#[tokio::test]
async fn test_edit_rejects_bad_mtu() {
    let (_dir, app) = create_test_app();
    let alice = create_peer(&app, "alice").await;
    let id = alice["id"].as_str().unwrap();

    let mut edit =
        response_json(send(&app, Method::GET, &format!("/api/v1/peers/{}/edit", id), None).await)
            .await;
    edit["mtu"] = json!({ "enabled": true, "value": "100" });

    let response = send(
        &app,
        Method::POST,
        &format!("/api/v1/peers/{}/apply", id),
        Some(edit),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["details"]["field"], "mtu");
}

// ============================================================================
// Server Tests
// ============================================================================

#[tokio::test]
async fn test_server_lifecycle() {
    let (_dir, app) = create_test_app();

    let json = response_json(send(&app, Method::GET, "/api/v1/server/status", None).await).await;
    assert_eq!(json["interface"], "wg0");
    assert_eq!(json["status"], "up");

    let response = send(&app, Method::POST, "/api/v1/server/down", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let json = response_json(send(&app, Method::GET, "/api/v1/server/status", None).await).await;
    assert_eq!(json["status"], "down");

    // Mutations need a running interface
    let body = json!({
        "name": "late",
        "attached": [{
            "peer": "root",
            "allowed_ips_new_to_old": "10.8.0.0/24",
            "allowed_ips_old_to_new": "10.8.0.2/32",
        }]
    });
    let response = send(&app, Method::POST, "/api/v1/peers", Some(body)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(&app, Method::POST, "/api/v1/server/up", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let config = response_text(send(&app, Method::GET, "/api/v1/server/config", None).await).await;
    assert!(config.contains("ListenPort = 51820"));
    assert!(config.contains("PublicKey"));

    let response = send(&app, Method::POST, "/api/v1/sync", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let status = response_json(send(&app, Method::GET, "/api/v1/status", None).await).await;
    assert_eq!(status["peers"], 2);
    assert_eq!(status["sync"]["status"], "synced");
}
