//! Durable state on disk
//!
//! The network lives in `<dir>/<interface>.json` and the rendered server
//! configuration in `<dir>/<interface>.conf`. Both are replaced atomically
//! through a temporary file in the same directory.

use crate::models::Network;
use crate::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const STATE_MODE: u32 = 0o660;
const CONFIG_MODE: u32 = 0o600;

/// File-backed store for the network and its rendered server config
#[derive(Debug, Clone)]
pub struct NetworkStorage {
    dir: PathBuf,
    interface: String,
}

impl NetworkStorage {
    pub fn new(dir: impl Into<PathBuf>, interface: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            interface: interface.into(),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.interface))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(format!("{}.conf", self.interface))
    }

    /// Previously persisted network, or `None` on first run
    pub fn load(&self) -> Result<Option<Network>> {
        let path = self.state_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No persisted network");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let network: Network = serde_json::from_str(&text).map_err(|e| {
            Error::Storage(format!("Cannot parse {}: {}", path.display(), e))
        })?;
        info!(
            path = %path.display(),
            peers = network.peers.len(),
            connections = network.connections.len(),
            "Loaded network"
        );
        Ok(Some(network))
    }

    /// Persist the network and its rendered server configuration
    ///
    /// The configuration is written first so that the JSON on disk never
    /// describes a state whose `.conf` was not written.
    pub fn save(&self, network: &Network, rendered: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Storage(format!("Cannot create {}: {}", self.dir.display(), e))
        })?;

        write_atomic(&self.config_path(), rendered.as_bytes(), CONFIG_MODE)?;
        let json = serde_json::to_vec_pretty(network)?;
        write_atomic(&self.state_path(), &json, STATE_MODE)?;

        debug!(dir = %self.dir.display(), "Persisted network");
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("{} has no parent directory", path.display())))?;

    let mut file = NamedTempFile::new_in(dir)
        .map_err(|e| Error::Storage(format!("Cannot create temp file in {}: {}", dir.display(), e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path)
        .map_err(|e| Error::Storage(format!("Cannot replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InterfaceOverride, Mobility, Peer, PeerId};
    use chrono::Utc;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    fn network() -> Network {
        Network::with_root(Peer {
            id: PeerId::root(),
            name: "this-server".into(),
            address: Ipv4Addr::new(10, 8, 0, 1),
            public_key: "pub".into(),
            private_key: "priv".into(),
            mobility: Mobility::Static,
            endpoint: "vpn.example.com:51820".into(),
            dns: InterfaceOverride::disabled(),
            mtu: InterfaceOverride::disabled(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_first_run_has_no_state() {
        let dir = TempDir::new().unwrap();
        let storage = NetworkStorage::new(dir.path(), "wg0");
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = NetworkStorage::new(dir.path().join("nested"), "wg0");
        let net = network();

        storage.save(&net, "[Interface]\n").unwrap();

        assert_eq!(storage.load().unwrap(), Some(net));
        assert_eq!(
            std::fs::read_to_string(storage.config_path()).unwrap(),
            "[Interface]\n"
        );
        // Only the two target files remain
        assert_eq!(std::fs::read_dir(dir.path().join("nested")).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = NetworkStorage::new(dir.path(), "wg0");
        storage.save(&network(), "").unwrap();

        let mode = |p: PathBuf| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(storage.config_path()), 0o600);
        assert_eq!(mode(storage.state_path()), 0o660);
    }

    #[test]
    fn test_corrupt_state() {
        let dir = TempDir::new().unwrap();
        let storage = NetworkStorage::new(dir.path(), "wg0");
        std::fs::write(storage.state_path(), "{not json").unwrap();
        assert!(matches!(storage.load(), Err(Error::Storage(_))));
    }
}
