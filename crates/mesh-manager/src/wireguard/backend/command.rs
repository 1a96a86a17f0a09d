//! Command-line WireGuard backend
//!
//! Drives the interface with `wg-quick` for its lifecycle and `wg syncconf`
//! for live reconciliation, so unchanged peers keep their sessions.

use super::traits::{BackendType, InterfaceStatus, PeerStats, WireGuardBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, trace};

/// Command-line WireGuard backend
///
/// Requires `wg` and `wg-quick` to be installed and the process to have
/// the privileges they need.
pub struct CommandBackend {
    /// Path to wg command (default: "wg")
    wg_path: String,
    /// Path to wg-quick command (default: "wg-quick")
    wg_quick_path: String,
    /// Cached availability check
    available: bool,
}

impl CommandBackend {
    /// Create a new command backend with default paths
    pub fn new() -> Self {
        Self::with_paths("wg".to_string(), "wg-quick".to_string())
    }

    /// Create with custom command paths
    pub fn with_paths(wg_path: String, wg_quick_path: String) -> Self {
        let available = Self::check_available(&wg_path) && Self::check_available(&wg_quick_path);
        Self {
            wg_path,
            wg_quick_path,
            available,
        }
    }

    fn check_available(cmd: &str) -> bool {
        std::process::Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute a command and return stdout
    async fn exec_command(&self, cmd: &str, args: &[&str]) -> Result<String> {
        trace!(cmd = cmd, args = ?args, "Executing command");

        let output = Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Environment(format!("Failed to execute {}: {}", cmd, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(cmd, args, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Missing device or tooling is an environment problem, anything else a
/// failed sync
fn classify_failure(cmd: &str, args: &[&str], stderr: &str) -> Error {
    let message = format!("{} {} failed: {}", cmd, args.join(" "), stderr);
    if is_missing_device(stderr) {
        Error::Environment(message)
    } else {
        Error::Sync(message)
    }
}

fn is_missing_device(stderr: &str) -> bool {
    stderr.contains("Cannot find device") || stderr.contains("No such device")
}

/// Parse `wg show <iface> dump`
///
/// The first line describes the interface itself; every following line is
/// one tab-separated peer record.
pub fn parse_dump(output: &str) -> Vec<PeerStats> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 8 {
                return None;
            }

            let endpoint = match fields[2] {
                "(none)" | "" => None,
                other => Some(other.to_string()),
            };
            let allowed_ips = match fields[3] {
                "(none)" | "" => Vec::new(),
                other => other.split(',').map(|s| s.trim().to_string()).collect(),
            };
            let last_handshake = fields[4]
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

            Some(PeerStats {
                public_key: fields[0].to_string(),
                endpoint,
                allowed_ips,
                last_handshake,
                rx_bytes: fields[5].parse().unwrap_or(0),
                tx_bytes: fields[6].parse().unwrap_or(0),
                persistent_keepalive: fields[7].parse().ok(),
            })
        })
        .collect()
}

#[async_trait]
impl WireGuardBackend for CommandBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Command
    }

    fn is_available(&self) -> bool {
        self.available
    }

    #[instrument(skip(self, config_path))]
    async fn bring_up(&self, interface: &str, config_path: &Path) -> Result<()> {
        debug!(path = %config_path.display(), "Bringing interface up");
        let path = config_path.to_string_lossy();
        self.exec_command(&self.wg_quick_path, &["up", &path])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, config_path))]
    async fn bring_down(&self, interface: &str, config_path: &Path) -> Result<()> {
        debug!("Bringing interface down");
        let path = config_path.to_string_lossy();
        self.exec_command(&self.wg_quick_path, &["down", &path])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, rendered))]
    async fn reconcile(&self, interface: &str, rendered: &str) -> Result<()> {
        // wg-quick derives the interface name from the file name
        let dir = tempfile::TempDir::new()?;
        let conf_path = dir.path().join(format!("{}.conf", interface));
        write_private(&conf_path, rendered).await?;

        let conf = conf_path.to_string_lossy();
        let stripped = self
            .exec_command(&self.wg_quick_path, &["strip", &conf])
            .await?;

        let stripped_path = dir.path().join(format!("{}.stripped", interface));
        write_private(&stripped_path, &stripped).await?;

        let stripped_arg = stripped_path.to_string_lossy();
        self.exec_command(&self.wg_path, &["syncconf", interface, &stripped_arg])
            .await?;

        debug!("Interface reconciled");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn dump(&self, interface: &str) -> Result<Vec<PeerStats>> {
        let output = self
            .exec_command(&self.wg_path, &["show", interface, "dump"])
            .await?;
        Ok(parse_dump(&output))
    }

    async fn interface_status(&self, interface: &str) -> Result<InterfaceStatus> {
        let output = self
            .exec_command(&self.wg_path, &["show", "interfaces"])
            .await?;
        if output.split_whitespace().any(|name| name == interface) {
            Ok(InterfaceStatus::Up)
        } else {
            Ok(InterfaceStatus::Down)
        }
    }
}

/// Write a file only the owner can read; it carries private keys
async fn write_private(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}
