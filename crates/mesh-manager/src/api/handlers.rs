//! API request handlers
//!
//! Handler functions for each API endpoint.

use super::dto::*;
use super::state::AppState;
use crate::edit::{EditDiff, PeerEdit};
use crate::models::PeerId;
use crate::service::{
    ApplyOutcome, CreateConnectionRequest, CreatePeerRequest, ManagerStatus, PeerSummary,
    Preamble,
};
use crate::Error;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Convert mesh errors to HTTP responses
fn error_response(err: Error) -> (StatusCode, Json<ApiError>) {
    let (status, error) = match &err {
        Error::PeerNotFound(id) => (
            StatusCode::NOT_FOUND,
            ApiError::not_found("Peer", id.as_str()),
        ),
        Error::ConnectionNotFound(id) => (
            StatusCode::NOT_FOUND,
            ApiError::not_found("Connection", &id.to_string()),
        ),
        Error::Validation { field, .. } => (
            StatusCode::BAD_REQUEST,
            ApiError::new("VALIDATION_ERROR", err.to_string())
                .with_details(serde_json::json!({ "field": field })),
        ),
        Error::InvalidArgument(_) => (
            StatusCode::BAD_REQUEST,
            ApiError::bad_request(err.to_string()),
        ),
        Error::InvalidModel(_) | Error::AddressSpaceExhausted(_) => {
            (StatusCode::CONFLICT, ApiError::conflict(err.to_string()))
        }
        Error::Sync(_) => (
            StatusCode::BAD_GATEWAY,
            ApiError::bad_gateway(err.to_string()),
        ),
        Error::Environment(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::unavailable(err.to_string()),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::internal(err.to_string()),
        ),
    };
    (status, Json(error))
}

// ============================================================================
// Network Handlers
// ============================================================================

/// Get the whole network without key material
pub async fn get_network(State(state): State<Arc<AppState>>) -> ApiResult<Json<NetworkResponse>> {
    let network = state.manager.network().await.map_err(error_response)?;
    let peers = state.manager.list_peers().await.map_err(error_response)?;

    Ok(Json(NetworkResponse {
        peers,
        connections: network
            .connections
            .values()
            .map(ConnectionResponse::from)
            .collect(),
    }))
}

/// Get manager status
pub async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<ManagerStatus>> {
    state
        .manager
        .status()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Re-render and reconcile the live interface with the stored network
pub async fn resync(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.manager.resync().await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Peer Handlers
// ============================================================================

/// List all peers with live telemetry
pub async fn list_peers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PeerSummary>>> {
    state
        .manager
        .list_peers()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Reserve an id and propose an address for a new peer
pub async fn get_preamble(State(state): State<Arc<AppState>>) -> ApiResult<Json<Preamble>> {
    state
        .manager
        .preamble()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Create a new peer
pub async fn create_peer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePeerRequest>,
) -> ApiResult<(StatusCode, Json<PeerSummary>)> {
    let peer = state.manager.create_peer(req).await.map_err(error_response)?;
    let summary = state
        .manager
        .get_peer(&peer.id)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Get a peer by id
pub async fn get_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<Json<PeerSummary>> {
    state
        .manager
        .get_peer(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Delete a peer and all of its connections
pub async fn delete_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .delete_peer(&id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rendered WireGuard config of a peer
pub async fn get_peer_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<impl IntoResponse> {
    let config = state
        .manager
        .peer_config(&id)
        .await
        .map_err(error_response)?;
    let disposition = format!("attachment; filename=\"{}.conf\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        config,
    ))
}

/// Peer config as an SVG QR code
pub async fn get_peer_qrcode(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<impl IntoResponse> {
    let svg = state
        .manager
        .peer_qr_svg(&id)
        .await
        .map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// Enable every connection of a peer
pub async fn enable_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .enable_peer(&id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Disable every connection of a peer
pub async fn disable_peer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .disable_peer(&id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rename a peer
pub async fn update_peer_name(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
    Json(req): Json<UpdateNameRequest>,
) -> ApiResult<Json<ApplyOutcome>> {
    state
        .manager
        .update_peer_name(&id, &req.name)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Move a peer to another address
pub async fn update_peer_address(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
    Json(req): Json<UpdateAddressRequest>,
) -> ApiResult<Json<ApplyOutcome>> {
    state
        .manager
        .update_peer_address(&id, &req.address)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================================
// Edit Handlers
// ============================================================================

/// Working copy of a peer and its connections
pub async fn get_peer_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
) -> ApiResult<Json<PeerEdit>> {
    state
        .manager
        .peer_edit(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Diff an edited working copy without applying it
pub async fn diff_peer_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
    Json(edit): Json<PeerEdit>,
) -> ApiResult<Json<EditDiff>> {
    state
        .manager
        .diff_edit(&id, edit)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Diff and apply an edited working copy
pub async fn apply_peer_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PeerId>,
    Json(edit): Json<PeerEdit>,
) -> ApiResult<Json<ApplyOutcome>> {
    state
        .manager
        .apply_edit(&id, edit)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================================
// Connection Handlers
// ============================================================================

/// Create a connection between two existing peers
pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConnectionRequest>,
) -> ApiResult<(StatusCode, Json<ConnectionResponse>)> {
    let conn = state
        .manager
        .create_connection(req)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(ConnectionResponse::from(&conn))))
}

/// Delete a connection
pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Path(path): Path<ConnectionPath>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .delete_connection(&path.id())
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Enable a connection
pub async fn enable_connection(
    State(state): State<Arc<AppState>>,
    Path(path): Path<ConnectionPath>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .set_connection_enabled(&path.id(), true)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Disable a connection
pub async fn disable_connection(
    State(state): State<Arc<AppState>>,
    Path(path): Path<ConnectionPath>,
) -> ApiResult<StatusCode> {
    state
        .manager
        .set_connection_enabled(&path.id(), false)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Server Handlers
// ============================================================================

/// Interface status
pub async fn get_server_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ServerStatusResponse>> {
    let status = state
        .manager
        .server_status()
        .await
        .map_err(error_response)?;
    Ok(Json(ServerStatusResponse {
        interface: state.manager.config().interface.clone(),
        status,
    }))
}

/// Bring the interface up
pub async fn server_up(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.manager.server_up().await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bring the interface down
pub async fn server_down(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.manager.server_down().await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rendered server config
pub async fn get_server_config(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let config = state
        .manager
        .server_config()
        .await
        .map_err(error_response)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], config))
}
