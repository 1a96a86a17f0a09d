//! WireGuard backend implementations
//!
//! 1. **Command** - `wg` / `wg-quick` on the host
//! 2. **Memory** - in-process fake for tests and dry runs
//!
//! # Usage
//!
//! ```ignore
//! use mesh_manager::wireguard::backend::{create_backend, BackendType};
//!
//! let backend = create_backend(BackendType::Command);
//! println!("Using {} backend", backend.backend_type());
//! ```

mod traits;

pub mod command;
pub mod memory;

pub use command::CommandBackend;
pub use memory::MemoryBackend;
pub use traits::{BackendType, InterfaceStatus, PeerStats, WireGuardBackend};

use std::sync::Arc;
use tracing::{info, warn};

/// Instantiate the backend of the requested type
pub fn create_backend(backend_type: BackendType) -> Arc<dyn WireGuardBackend> {
    let backend: Arc<dyn WireGuardBackend> = match backend_type {
        BackendType::Command => Arc::new(CommandBackend::new()),
        BackendType::Memory => Arc::new(MemoryBackend::new()),
    };

    if backend.is_available() {
        info!(backend = %backend_type, "WireGuard backend selected");
    } else {
        warn!(
            backend = %backend_type,
            "WireGuard tools not found; interface operations will fail"
        );
    }

    backend
}
