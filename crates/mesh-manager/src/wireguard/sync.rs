//! WireGuard configuration synchronization
//!
//! Persists the network together with its rendered server configuration and
//! pushes that configuration to the live interface, tracking the outcome.

use super::backend::{InterfaceStatus, PeerStats, WireGuardBackend};
use super::config::ConfigRenderer;
use crate::models::Network;
use crate::storage::NetworkStorage;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Sync status of the live interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Configuration not yet synced
    Pending,
    /// Sync in progress
    Syncing,
    /// Successfully synced
    Synced,
    /// Sync failed
    Failed,
    /// Interface no longer carries the durable configuration
    Stale,
}

/// Outcome of the most recent syncs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// Current sync status
    pub status: SyncStatus,
    /// Fingerprint of the last applied configuration
    pub config_version: Option<String>,
    /// Last successful sync timestamp
    pub last_sync: Option<DateTime<Utc>>,
    /// Last sync attempt timestamp
    pub last_attempt: Option<DateTime<Utc>>,
    /// Number of consecutive failures
    pub failure_count: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            status: SyncStatus::Pending,
            config_version: None,
            last_sync: None,
            last_attempt: None,
            failure_count: 0,
            last_error: None,
        }
    }

    pub fn mark_syncing(&mut self) {
        self.status = SyncStatus::Syncing;
        self.last_attempt = Some(Utc::now());
    }

    /// Update state after successful sync
    pub fn mark_synced(&mut self, config_version: String) {
        let now = Utc::now();
        self.status = SyncStatus::Synced;
        self.config_version = Some(config_version);
        self.last_sync = Some(now);
        self.last_attempt = Some(now);
        self.failure_count = 0;
        self.last_error = None;
    }

    /// Update state after failed sync
    pub fn mark_failed(&mut self, error: String) {
        self.status = SyncStatus::Failed;
        self.last_attempt = Some(Utc::now());
        self.failure_count += 1;
        self.last_error = Some(error);
    }

    /// Mark configuration as stale (needs resync)
    pub fn mark_stale(&mut self) {
        if self.status == SyncStatus::Synced {
            self.status = SyncStatus::Stale;
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Short fingerprint identifying a rendered configuration
fn config_version(rendered: &str) -> String {
    let mut hasher = DefaultHasher::new();
    rendered.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Drives persistence and the live interface for one WireGuard interface
pub struct SyncEngine {
    backend: Arc<dyn WireGuardBackend>,
    storage: NetworkStorage,
    renderer: ConfigRenderer,
    interface: String,
    timeout: Duration,
    state: RwLock<SyncState>,
}

impl SyncEngine {
    pub fn new(
        backend: Arc<dyn WireGuardBackend>,
        storage: NetworkStorage,
        renderer: ConfigRenderer,
        interface: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            storage,
            renderer,
            interface: interface.into(),
            timeout,
            state: RwLock::new(SyncState::new()),
        }
    }

    pub fn renderer(&self) -> &ConfigRenderer {
        &self.renderer
    }

    pub fn storage(&self) -> &NetworkStorage {
        &self.storage
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn backend(&self) -> &Arc<dyn WireGuardBackend> {
        &self.backend
    }

    /// Current sync state
    pub fn state(&self) -> SyncState {
        self.state.read().clone()
    }

    /// Render the server configuration and write it with the network
    ///
    /// Nothing is pushed to the interface if this fails.
    pub fn persist(&self, network: &Network) -> Result<String> {
        let rendered = self.renderer.render_server(network)?;
        self.storage.save(network, &rendered).map_err(|e| {
            error!(error = %e, "Failed to persist network");
            e
        })?;
        Ok(rendered)
    }

    /// Run one backend call under the sync timeout
    ///
    /// Expiry drops the call, which kills any child process it spawned.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Sync(format!(
                "{} did not finish within {:?}",
                operation, self.timeout
            ))),
        }
    }

    /// Push `rendered` to the live interface
    #[instrument(skip(self, rendered), fields(interface = %self.interface))]
    pub async fn reconcile(&self, rendered: &str) -> Result<()> {
        self.state.write().mark_syncing();

        let outcome = self
            .bounded("reconcile", self.backend.reconcile(&self.interface, rendered))
            .await;

        match outcome {
            Ok(()) => {
                debug!("Live interface matches durable state");
                self.state.write().mark_synced(config_version(rendered));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Reconcile failed; durable state kept as target");
                self.state.write().mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Persist `network`, then reconcile the interface with it
    pub async fn sync(&self, network: &Network) -> Result<()> {
        let rendered = self.persist(network)?;
        self.reconcile(&rendered).await
    }

    /// First sync after process start: restart the interface from the
    /// persisted config, then reconcile
    #[instrument(skip(self, network), fields(interface = %self.interface))]
    pub async fn startup(&self, network: &Network) -> Result<()> {
        let rendered = self.persist(network)?;
        let config_path = self.storage.config_path();

        if let Err(e) = self
            .bounded("bring down", self.backend.bring_down(&self.interface, &config_path))
            .await
        {
            debug!(error = %e, "Interface was not up");
        }

        if let Err(e) = self
            .bounded("bring up", self.backend.bring_up(&self.interface, &config_path))
            .await
        {
            error!(error = %e, "Failed to bring interface up");
            self.state.write().mark_failed(e.to_string());
            return Err(e);
        }
        info!("Interface up");

        self.reconcile(&rendered).await
    }

    /// Bring the interface up from the persisted configuration
    pub async fn bring_up(&self) -> Result<()> {
        let config_path = self.storage.config_path();
        self.bounded("bring up", self.backend.bring_up(&self.interface, &config_path))
            .await?;
        if let Ok(rendered) = tokio::fs::read_to_string(&config_path).await {
            self.state.write().mark_synced(config_version(&rendered));
        }
        info!(interface = %self.interface, "Interface up");
        Ok(())
    }

    /// Take the interface down; the durable state is untouched
    pub async fn bring_down(&self) -> Result<()> {
        let config_path = self.storage.config_path();
        self.bounded("bring down", self.backend.bring_down(&self.interface, &config_path))
            .await?;
        self.state.write().mark_stale();
        info!(interface = %self.interface, "Interface down");
        Ok(())
    }

    pub async fn interface_status(&self) -> Result<InterfaceStatus> {
        self.bounded("status", self.backend.interface_status(&self.interface))
            .await
    }

    pub async fn dump(&self) -> Result<Vec<PeerStats>> {
        self.bounded("dump", self.backend.dump(&self.interface)).await
    }
}
