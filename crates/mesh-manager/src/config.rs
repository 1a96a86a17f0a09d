//! Runtime configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! the `WG_*` / `API_*` environment variables.

use crate::address_space::{DEFAULT_LISTEN_PORT, DEFAULT_SUBNET, MAX_PREFIX_LEN};
use crate::wireguard::backend::BackendType;
use crate::{Error, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the mesh manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// WireGuard interface name
    pub interface: String,
    /// Directory holding `<interface>.json` and `<interface>.conf`
    pub state_dir: PathBuf,
    /// Public host of this server, used for the root peer's endpoint
    pub host: String,
    /// WireGuard listen port
    pub port: u16,
    /// Mesh subnet; the first host belongs to the root peer
    pub subnet: Ipv4Net,
    /// DNS written into peer configs without an override
    pub default_dns: Option<String>,
    /// MTU written into peer configs without an override
    pub default_mtu: Option<u16>,
    /// Keepalive suggested for new connections (seconds)
    pub default_keepalive: u16,
    pub post_up: Option<String>,
    pub post_down: Option<String>,
    /// Upper bound on a single live-interface reconcile
    pub sync_timeout_secs: u64,
    pub backend: BackendType,
    pub api: ApiServerConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            interface: "wg0".to_string(),
            state_dir: PathBuf::from("/etc/wireguard"),
            host: String::new(),
            port: DEFAULT_LISTEN_PORT,
            subnet: DEFAULT_SUBNET,
            default_dns: Some("1.1.1.1".to_string()),
            default_mtu: None,
            default_keepalive: 25,
            post_up: None,
            post_down: None,
            sync_timeout_secs: 30,
            backend: BackendType::Command,
            api: ApiServerConfig::default(),
        }
    }
}

impl MeshConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a TOML file, then overlay the process environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidArgument(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::InvalidArgument(format!("Invalid config: {}", e)))
    }

    /// Overlay variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WG_INTERFACE") {
            self.interface = v;
        }
        if let Some(v) = lookup("WG_PATH") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("WG_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("WG_PORT") {
            self.port = parse_var("WG_PORT", &v)?;
        }
        if let Some(v) = lookup("WG_DEFAULT_ADDRESS") {
            self.subnet = parse_subnet(&v)?;
        }
        if let Some(v) = lookup("WG_DEFAULT_DNS") {
            self.default_dns = non_empty(v);
        }
        if let Some(v) = lookup("WG_MTU") {
            self.default_mtu = match non_empty(v) {
                Some(v) => Some(parse_var("WG_MTU", &v)?),
                None => None,
            };
        }
        if let Some(v) = lookup("WG_PERSISTENT_KEEPALIVE") {
            self.default_keepalive = parse_var("WG_PERSISTENT_KEEPALIVE", &v)?;
        }
        if let Some(v) = lookup("WG_POST_UP") {
            self.post_up = non_empty(v);
        }
        if let Some(v) = lookup("WG_POST_DOWN") {
            self.post_down = non_empty(v);
        }
        if let Some(v) = lookup("WG_SYNC_TIMEOUT") {
            self.sync_timeout_secs = parse_var("WG_SYNC_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("WG_BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = lookup("API_PORT") {
            self.api.port = parse_var("API_PORT", &v)?;
        }
        Ok(())
    }

    /// Reject settings the manager cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::validation("host", "WG_HOST must be set"));
        }
        if self.interface.is_empty() || self.interface.len() > 15 {
            return Err(Error::validation(
                "interface",
                "interface name must be 1-15 characters",
            ));
        }
        if self.subnet.prefix_len() > MAX_PREFIX_LEN {
            return Err(Error::validation(
                "subnet",
                format!("{} leaves no room for peers", self.subnet),
            ));
        }
        if self.sync_timeout_secs == 0 {
            return Err(Error::validation("sync_timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Endpoint other peers use to reach this server
    pub fn root_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 51821,
        }
    }
}

impl ApiServerConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{}: cannot parse '{}'", name, value)))
}

/// Accepts `10.8.0.0/24` or the template form `10.8.0.x`
fn parse_subnet(value: &str) -> Result<Ipv4Net> {
    let value = value.trim();
    if let Some(prefix) = value.strip_suffix(".x") {
        let net: Ipv4Net = format!("{}.0/24", prefix).parse().map_err(|_| {
            Error::InvalidArgument(format!("WG_DEFAULT_ADDRESS: cannot parse '{}'", value))
        })?;
        return Ok(net);
    }
    let net: Ipv4Net = value.parse().map_err(|_| {
        Error::InvalidArgument(format!("WG_DEFAULT_ADDRESS: cannot parse '{}'", value))
    })?;
    Ok(net.trunc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MeshConfig::default();
        assert_eq!(config.interface, "wg0");
        assert_eq!(config.port, 51820);
        assert_eq!(config.subnet.to_string(), "10.8.0.0/24");
        assert_eq!(config.backend, BackendType::Command);
        // No host configured yet
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overlay() {
        let mut config = MeshConfig::default();
        config
            .apply_env(env(&[
                ("WG_HOST", "vpn.example.com"),
                ("WG_PORT", "51999"),
                ("WG_DEFAULT_ADDRESS", "10.20.0.x"),
                ("WG_MTU", "1420"),
                ("WG_DEFAULT_DNS", ""),
                ("WG_BACKEND", "memory"),
                ("API_PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.root_endpoint(), "vpn.example.com:51999");
        assert_eq!(config.subnet.to_string(), "10.20.0.0/24");
        assert_eq!(config.default_mtu, Some(1420));
        assert_eq!(config.default_dns, None);
        assert_eq!(config.backend, BackendType::Memory);
        assert_eq!(config.api.bind_addr(), "0.0.0.0:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = MeshConfig::default();
        let err = config.apply_env(env(&[("WG_PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("WG_PORT"));
    }

    #[test]
    fn test_toml_file() {
        let config = MeshConfig::from_toml(
            r#"
            interface = "wg1"
            host = "203.0.113.10"
            subnet = "10.9.0.0/16"
            post_up = "iptables -A FORWARD -i wg1 -j ACCEPT"

            [api]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.interface, "wg1");
        assert_eq!(config.subnet.prefix_len(), 16);
        assert_eq!(config.port, 51820);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "0.0.0.0");
    }

    #[test]
    fn test_tiny_subnet_rejected() {
        let config = MeshConfig {
            host: "vpn.example.com".into(),
            subnet: "10.8.0.0/31".parse().unwrap(),
            ..MeshConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field(), Some("subnet"));
    }
}
