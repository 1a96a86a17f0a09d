//! Authoritative in-memory network

use crate::models::Network;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holder of the current network
///
/// Readers get an `Arc` snapshot and never observe a half-applied change;
/// writers replace the whole network after it passes validation.
#[derive(Debug, Default)]
pub struct NetworkStore {
    current: RwLock<Arc<Network>>,
}

impl NetworkStore {
    pub fn new(network: Network) -> Self {
        Self {
            current: RwLock::new(Arc::new(network)),
        }
    }

    /// Snapshot of the current network
    pub fn snapshot(&self) -> Arc<Network> {
        self.current.read().clone()
    }

    /// Validate `network` and make it current; on error nothing changes
    pub fn commit(&self, network: Network) -> Result<Arc<Network>> {
        network.validate()?;
        let network = Arc::new(network);
        *self.current.write() = network.clone();
        Ok(network)
    }
}
