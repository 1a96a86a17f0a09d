//! API router configuration
//!
//! Defines all API routes and middleware.

use super::handlers;
use super::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Network
        .route("/api/v1/network", get(handlers::get_network))
        .route("/api/v1/status", get(handlers::get_status))
        .route("/api/v1/sync", post(handlers::resync))
        // Peers
        .route("/api/v1/peers", get(handlers::list_peers))
        .route("/api/v1/peers", post(handlers::create_peer))
        .route("/api/v1/peers/preamble", get(handlers::get_preamble))
        .route("/api/v1/peers/:id", get(handlers::get_peer))
        .route("/api/v1/peers/:id", delete(handlers::delete_peer))
        .route("/api/v1/peers/:id/config", get(handlers::get_peer_config))
        .route("/api/v1/peers/:id/qrcode.svg", get(handlers::get_peer_qrcode))
        .route("/api/v1/peers/:id/enable", post(handlers::enable_peer))
        .route("/api/v1/peers/:id/disable", post(handlers::disable_peer))
        .route("/api/v1/peers/:id/name", put(handlers::update_peer_name))
        .route("/api/v1/peers/:id/address", put(handlers::update_peer_address))
        // Edits
        .route("/api/v1/peers/:id/edit", get(handlers::get_peer_edit))
        .route("/api/v1/peers/:id/diff", post(handlers::diff_peer_edit))
        .route("/api/v1/peers/:id/apply", post(handlers::apply_peer_edit))
        // Connections
        .route("/api/v1/connections", post(handlers::create_connection))
        .route("/api/v1/connections/:a/:b", delete(handlers::delete_connection))
        .route(
            "/api/v1/connections/:a/:b/enable",
            post(handlers::enable_connection),
        )
        .route(
            "/api/v1/connections/:a/:b/disable",
            post(handlers::disable_connection),
        )
        // Server
        .route("/api/v1/server/status", get(handlers::get_server_status))
        .route("/api/v1/server/config", get(handlers::get_server_config))
        .route("/api/v1/server/up", post(handlers::server_up))
        .route("/api/v1/server/down", post(handlers::server_down))
        // Health
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Ready once the network has been loaded and the interface brought up
async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.manager.is_initialized() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
