//! Host addresses of the mesh subnet
//!
//! The first host belongs to the root peer; every other peer draws from the
//! remaining hosts, lowest first.

use crate::models::Network;
use crate::{Error, Result};
use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Used/free view of one subnet's host addresses
#[derive(Debug, Clone)]
pub struct AddressPool {
    subnet: Ipv4Net,
    used: BTreeSet<Ipv4Addr>,
}

impl AddressPool {
    pub fn new(subnet: Ipv4Net) -> Self {
        Self {
            subnet: subnet.trunc(),
            used: BTreeSet::new(),
        }
    }

    /// Pool with every address of `network` marked as used
    pub fn from_network(subnet: Ipv4Net, network: &Network) -> Self {
        let mut pool = Self::new(subnet);
        pool.used.extend(network.used_addresses());
        pool
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// First host of the subnet
    pub fn root_address(&self) -> Ipv4Addr {
        self.subnet
            .hosts()
            .next()
            .unwrap_or_else(|| self.subnet.network())
    }

    /// Neither the network nor the broadcast address, and inside the subnet
    pub fn is_host(&self, ip: Ipv4Addr) -> bool {
        self.subnet.contains(&ip) && ip != self.subnet.network() && ip != self.subnet.broadcast()
    }

    /// Hosts open to non-root peers, in ascending order
    fn peer_hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        // /31 and /32 leave nothing besides root
        let skip = if self.subnet.prefix_len() >= 31 { usize::MAX } else { 1 };
        self.subnet.hosts().skip(skip)
    }

    /// Lowest host nobody uses
    pub fn next_free(&self) -> Result<Ipv4Addr> {
        self.peer_hosts()
            .find(|ip| !self.used.contains(ip))
            .ok_or(Error::AddressSpaceExhausted(self.subnet))
    }

    pub fn free_count(&self) -> usize {
        self.peer_hosts().filter(|ip| !self.used.contains(ip)).count()
    }
}
