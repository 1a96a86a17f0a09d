//! In-memory WireGuard backend
//!
//! Keeps the "running" configuration of each interface in memory. Used by
//! the test suite and for dry runs on hosts without WireGuard.

use super::traits::{BackendType, InterfaceStatus, PeerStats, WireGuardBackend};
use crate::wireguard::parse_peer_blocks;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    /// Running configuration per interface that is up
    running: HashMap<String, String>,
    bring_up_calls: usize,
    bring_down_calls: usize,
    reconcile_calls: usize,
    /// Fail the next N reconciles with a sync error
    failing_reconciles: usize,
    /// Pretend the kernel has no WireGuard support
    missing_device: bool,
    reconcile_delay: Option<Duration>,
    lifecycle_delay: Option<Duration>,
}

/// Backend that records calls instead of touching the host
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` reconciles fail
    pub fn fail_reconciles(&self, count: usize) {
        self.state.lock().failing_reconciles = count;
    }

    /// Simulate a host without the WireGuard device
    pub fn set_missing_device(&self, missing: bool) {
        self.state.lock().missing_device = missing;
    }

    /// Delay every reconcile, to exercise timeouts
    pub fn set_reconcile_delay(&self, delay: Option<Duration>) {
        self.state.lock().reconcile_delay = delay;
    }

    /// Delay every bring up/down, as a stuck `wg-quick` would
    pub fn set_lifecycle_delay(&self, delay: Option<Duration>) {
        self.state.lock().lifecycle_delay = delay;
    }

    async fn lifecycle_pause(&self) {
        let delay = self.state.lock().lifecycle_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn reconcile_calls(&self) -> usize {
        self.state.lock().reconcile_calls
    }

    pub fn bring_up_calls(&self) -> usize {
        self.state.lock().bring_up_calls
    }

    pub fn bring_down_calls(&self) -> usize {
        self.state.lock().bring_down_calls
    }

    /// Configuration currently applied to `interface`, if it is up
    pub fn running_config(&self, interface: &str) -> Option<String> {
        self.state.lock().running.get(interface).cloned()
    }

    fn missing_device_error(interface: &str) -> Error {
        Error::Environment(format!("Cannot find device \"{}\"", interface))
    }
}

#[async_trait]
impl WireGuardBackend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn bring_up(&self, interface: &str, config_path: &Path) -> Result<()> {
        self.lifecycle_pause().await;
        let config = tokio::fs::read_to_string(config_path).await.map_err(|e| {
            Error::Environment(format!("Cannot read {}: {}", config_path.display(), e))
        })?;

        let mut state = self.state.lock();
        state.bring_up_calls += 1;
        if state.missing_device {
            return Err(Self::missing_device_error(interface));
        }
        if state.running.contains_key(interface) {
            return Err(Error::Sync(format!("{} already exists", interface)));
        }
        state.running.insert(interface.to_string(), config);
        debug!(interface, "Memory interface up");
        Ok(())
    }

    async fn bring_down(&self, interface: &str, _config_path: &Path) -> Result<()> {
        self.lifecycle_pause().await;
        let mut state = self.state.lock();
        state.bring_down_calls += 1;
        if state.running.remove(interface).is_none() {
            return Err(Error::Sync(format!("{} is not a WireGuard interface", interface)));
        }
        debug!(interface, "Memory interface down");
        Ok(())
    }

    async fn reconcile(&self, interface: &str, rendered: &str) -> Result<()> {
        let delay = {
            let mut state = self.state.lock();
            state.reconcile_calls += 1;
            state.reconcile_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        // Reject anything wg-quick strip would reject
        parse_peer_blocks(rendered)?;

        let mut state = self.state.lock();
        if state.missing_device || !state.running.contains_key(interface) {
            return Err(Self::missing_device_error(interface));
        }
        if state.failing_reconciles > 0 {
            state.failing_reconciles -= 1;
            return Err(Error::Sync("injected reconcile failure".to_string()));
        }
        state
            .running
            .insert(interface.to_string(), rendered.to_string());
        Ok(())
    }

    async fn dump(&self, interface: &str) -> Result<Vec<PeerStats>> {
        let running = self
            .running_config(interface)
            .ok_or_else(|| Self::missing_device_error(interface))?;

        Ok(parse_peer_blocks(&running)?
            .into_iter()
            .map(|peer| PeerStats {
                public_key: peer.public_key,
                endpoint: peer.endpoint,
                allowed_ips: peer
                    .allowed_ips
                    .map(|ips| ips.nets().iter().map(|net| net.to_string()).collect())
                    .unwrap_or_default(),
                persistent_keepalive: peer.persistent_keepalive,
                ..Default::default()
            })
            .collect())
    }

    async fn interface_status(&self, interface: &str) -> Result<InterfaceStatus> {
        if self.state.lock().running.contains_key(interface) {
            Ok(InterfaceStatus::Up)
        } else {
            Ok(InterfaceStatus::Down)
        }
    }
}
