//! Field validators
//!
//! Every validator returns the parsed value or `Error::Validation` naming
//! the field it was called for.

use crate::allocator::AddressPool;
use crate::models::{AllowedIps, InterfaceOverride, Network, PeerId, PersistentKeepalive};
use crate::{Error, Result};
use ipnet::Ipv4Net;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use uuid::Uuid;

/// One DNS label: alphanumerics and inner hyphens, at most 63 characters
static DNS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid DNS label pattern")
});

pub const MIN_MTU: u16 = 1280;
pub const MAX_MTU: u16 = 9000;

pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    // Names end up in config comments; a line break would start a new directive
    if name.chars().any(char::is_control) {
        return Err(Error::validation(
            "name",
            "must not contain line breaks or control characters",
        ));
    }
    Ok(name.to_string())
}

/// Client-chosen id for a new peer: a UUID, as handed out by the preamble
pub fn validate_peer_id(id: &PeerId) -> Result<()> {
    if id.is_root() {
        return Err(Error::validation("id", "'root' is reserved"));
    }
    Uuid::parse_str(id.as_str())
        .map_err(|_| Error::validation("id", format!("'{}' is not a UUID", id)))?;
    Ok(())
}

/// Address inside `subnet`, not network/broadcast, not held by another peer
pub fn validate_address(
    value: &str,
    subnet: Ipv4Net,
    network: &Network,
    owner: Option<&PeerId>,
) -> Result<Ipv4Addr> {
    let address: Ipv4Addr = value
        .trim()
        .parse()
        .map_err(|_| Error::validation("address", format!("'{}' is not an IPv4 address", value)))?;

    if !subnet.contains(&address) {
        return Err(Error::validation(
            "address",
            format!("{} is outside {}", address, subnet),
        ));
    }
    if !AddressPool::new(subnet).is_host(address) {
        return Err(Error::validation(
            "address",
            format!("{} is not a host address of {}", address, subnet),
        ));
    }
    if let Some(holder) = network.peer_with_address(address) {
        if Some(&holder.id) != owner {
            return Err(Error::validation(
                "address",
                format!("{} is already used by peer '{}'", address, holder.name),
            ));
        }
    }
    Ok(address)
}

fn is_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let host = host.strip_suffix('.').unwrap_or(host);
    host.split('.').all(|label| DNS_LABEL.is_match(label))
}

/// `ipv4:port` or `hostname:port`
pub fn validate_endpoint(value: &str) -> Result<String> {
    let value = value.trim();
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| Error::validation("endpoint", "expected 'host:port'"))?;

    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) || port.parse::<u16>().is_err()
    {
        return Err(Error::validation(
            "endpoint",
            format!("'{}' is not a port in 0-65535", port),
        ));
    }

    let looks_numeric = host.chars().all(|c| c.is_ascii_digit() || c == '.');
    let valid_host = if looks_numeric {
        host.parse::<Ipv4Addr>().is_ok()
    } else {
        is_hostname(host)
    };
    if !valid_host {
        return Err(Error::validation(
            "endpoint",
            format!("'{}' is neither an IPv4 address nor a hostname", host),
        ));
    }

    Ok(value.to_string())
}

/// Comma-separated IPv4 CIDR list
pub fn validate_allowed_ips(field: &str, value: &str) -> Result<AllowedIps> {
    value
        .parse()
        .map_err(|e: crate::models::AllowedIpsParseError| Error::validation(field, e.to_string()))
}

/// Positive interval when enabled; a disabled keepalive keeps any value
pub fn validate_keepalive(keepalive: PersistentKeepalive) -> Result<PersistentKeepalive> {
    if keepalive.enabled && keepalive.value == 0 {
        return Err(Error::validation(
            "persistent_keepalive",
            "must be a positive number of seconds",
        ));
    }
    Ok(keepalive)
}

/// DNS override: comma-separated IPv4 servers when enabled
pub fn validate_dns(dns: &InterfaceOverride) -> Result<InterfaceOverride> {
    if !dns.enabled {
        return Ok(dns.clone());
    }
    let servers: Vec<&str> = dns.value.split(',').map(str::trim).collect();
    if servers.iter().any(|s| s.parse::<Ipv4Addr>().is_err()) {
        return Err(Error::validation(
            "dns",
            format!("'{}' is not a list of IPv4 addresses", dns.value),
        ));
    }
    Ok(InterfaceOverride::enabled(servers.join(", ")))
}

/// MTU override: an integer in 1280-9000 when enabled
pub fn validate_mtu(mtu: &InterfaceOverride) -> Result<InterfaceOverride> {
    if !mtu.enabled {
        return Ok(mtu.clone());
    }
    match mtu.value.trim().parse::<u16>() {
        Ok(value) if (MIN_MTU..=MAX_MTU).contains(&value) => {
            Ok(InterfaceOverride::enabled(value.to_string()))
        }
        _ => Err(Error::validation(
            "mtu",
            format!("'{}' is not in {}-{}", mtu.value, MIN_MTU, MAX_MTU),
        )),
    }
}

/// A new peer must be attached to at least one existing peer
pub fn validate_peer_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::validation(
            "peer_count",
            "a new peer needs at least one connection",
        ));
    }
    Ok(())
}
