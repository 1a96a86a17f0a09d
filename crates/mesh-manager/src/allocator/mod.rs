//! Address allocation for new peers
//!
//! The allocator is stateless with respect to the network: every call
//! rebuilds the used set from the snapshot it is given, so the same
//! network always yields the same address.

mod pool;

pub use pool::AddressPool;

use crate::models::Network;
use crate::Result;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Assigns addresses from the configured mesh subnet
#[derive(Debug, Clone, Copy)]
pub struct AddressAllocator {
    subnet: Ipv4Net,
}

impl AddressAllocator {
    pub fn new(subnet: Ipv4Net) -> Self {
        Self {
            subnet: subnet.trunc(),
        }
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// Address given to the root peer on first run
    pub fn root_address(&self) -> Ipv4Addr {
        AddressPool::new(self.subnet).root_address()
    }

    /// First free host address not used by any peer of `network`
    pub fn allocate(&self, network: &Network) -> Result<Ipv4Addr> {
        AddressPool::from_network(self.subnet, network).next_free()
    }

    /// Number of addresses still free in `network`
    pub fn available(&self, network: &Network) -> usize {
        AddressPool::from_network(self.subnet, network).free_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InterfaceOverride, Mobility, Peer, PeerId};
    use crate::Error;
    use chrono::Utc;

    fn peer(id: PeerId, address: Ipv4Addr) -> Peer {
        Peer {
            id,
            name: "p".into(),
            address,
            public_key: String::new(),
            private_key: String::new(),
            mobility: Mobility::Roaming,
            endpoint: String::new(),
            dns: InterfaceOverride::disabled(),
            mtu: InterfaceOverride::disabled(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_allocation_is_ascending_and_deterministic() {
        let allocator = AddressAllocator::new("10.8.0.0/29".parse().unwrap());
        let mut network = Network::with_root(peer(PeerId::root(), allocator.root_address()));

        let mut seen = Vec::new();
        loop {
            match allocator.allocate(&network) {
                Ok(addr) => {
                    // Same snapshot, same answer
                    assert_eq!(allocator.allocate(&network).unwrap(), addr);
                    seen.push(addr);
                    let id = PeerId::generate();
                    network.peers.insert(id.clone(), peer(id, addr));
                }
                Err(err) => {
                    assert!(matches!(err, Error::AddressSpaceExhausted(_)));
                    break;
                }
            }
        }

        let expected: Vec<_> = (2..=6).map(|i| Ipv4Addr::new(10, 8, 0, i)).collect();
        assert_eq!(seen, expected);
        assert_eq!(allocator.available(&network), 0);
    }

    #[test]
    fn test_root_address() {
        let allocator = AddressAllocator::new("10.8.0.0/24".parse().unwrap());
        assert_eq!(allocator.root_address(), Ipv4Addr::new(10, 8, 0, 1));
    }
}
