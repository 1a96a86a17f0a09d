//! REST API for the mesh
//!
//! # Endpoints
//!
//! ## Network
//! - `GET /api/v1/network` - Peers and connections, without key material
//! - `GET /api/v1/status` - Manager and sync status
//! - `POST /api/v1/sync` - Reconcile the live interface with the stored network
//!
//! ## Peers
//! - `GET /api/v1/peers` - List peers with live telemetry
//! - `POST /api/v1/peers` - Create a peer and its initial connections
//! - `GET /api/v1/peers/preamble` - Reserve an id and propose an address
//! - `GET /api/v1/peers/:id` - Get a peer
//! - `DELETE /api/v1/peers/:id` - Delete a peer and its connections
//! - `GET /api/v1/peers/:id/config` - Rendered WireGuard config
//! - `GET /api/v1/peers/:id/qrcode.svg` - Config as a QR code
//! - `POST /api/v1/peers/:id/enable` - Enable all of the peer's connections
//! - `POST /api/v1/peers/:id/disable` - Disable all of the peer's connections
//! - `PUT /api/v1/peers/:id/name` - Rename
//! - `PUT /api/v1/peers/:id/address` - Change address
//!
//! ## Edits
//! - `GET /api/v1/peers/:id/edit` - Working copy of a peer and its connections
//! - `POST /api/v1/peers/:id/diff` - Diff a working copy (dry run)
//! - `POST /api/v1/peers/:id/apply` - Diff and apply a working copy
//!
//! ## Connections
//! - `POST /api/v1/connections` - Connect two peers
//! - `DELETE /api/v1/connections/:a/:b` - Remove a connection
//! - `POST /api/v1/connections/:a/:b/enable` - Enable a connection
//! - `POST /api/v1/connections/:a/:b/disable` - Disable a connection
//!
//! ## Server
//! - `GET /api/v1/server/status` - Interface up/down
//! - `GET /api/v1/server/config` - Rendered server config
//! - `POST /api/v1/server/up` - Bring the interface up
//! - `POST /api/v1/server/down` - Bring the interface down
//!
//! ## Health
//! - `GET /health` - Health check
//! - `GET /ready` - Readiness check

pub mod dto;
pub mod handlers;
pub mod router;
pub mod state;

pub use crate::config::ApiServerConfig;
pub use dto::*;
pub use router::create_router;
pub use state::AppState;

use std::sync::Arc;

/// Start the API server
///
/// # Example
///
/// ```ignore
/// use mesh_manager::api::{start_server, AppState};
/// use mesh_manager::{MeshConfig, MeshManager};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let config = MeshConfig::from_env().unwrap();
///     let api = config.api.clone();
///     let state = Arc::new(AppState::new(MeshManager::new(config).unwrap()));
///     start_server(state, api).await.unwrap();
/// }
/// ```
pub async fn start_server(
    state: Arc<AppState>,
    config: ApiServerConfig,
) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr()).await?;

    tracing::info!("Starting API server on {}", config.bind_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
