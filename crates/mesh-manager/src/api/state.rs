//! Application state for the API
//!
//! Holds shared state across all API handlers.

use crate::service::MeshManager;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    /// Mesh manager service; serializes its own mutations
    pub manager: Arc<MeshManager>,
}

impl AppState {
    pub fn new(manager: MeshManager) -> Self {
        Self::with_manager(Arc::new(manager))
    }

    /// Share an existing manager with the API
    pub fn with_manager(manager: Arc<MeshManager>) -> Self {
        Self { manager }
    }
}
