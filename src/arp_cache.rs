use alloc::vec::Vec;

use crate::repr::{
    EthernetAddress,
    Ipv4Address,
};

#[derive(Debug)]
struct Entry {
    ipv4_addr: Ipv4Address,
    eth_addr: EthernetAddress,
    last_used: u64,
}

/// Maintains a bounded set of IPv4 -> Ethernet address mappings.
///
/// Once the cache is full, adding a new mapping evicts the least recently
/// used one. Storage is allocated up front so the cache never allocates while
/// a frame is being received.
#[derive(Debug)]
pub struct ArpCache {
    entries: Vec<Entry>,
    capacity: usize,
    clock: u64,
}

impl ArpCache {
    pub const DEFAULT_CAPACITY: usize = 128;

    /// Creates an ARP cache holding at most capacity mappings.
    pub fn new(capacity: usize) -> ArpCache {
        ArpCache {
            entries: Vec::with_capacity(capacity),
            capacity,
            clock: 0,
        }
    }

    /// Lookup the Ethernet address for an IPv4 address.
    pub fn eth_addr_for_ip(&mut self, ipv4_addr: Ipv4Address) -> Option<EthernetAddress> {
        let now = self.tick();

        self.entries
            .iter_mut()
            .find(|entry| entry.ipv4_addr == ipv4_addr)
            .map(|entry| {
                entry.last_used = now;
                entry.eth_addr
            })
    }

    /// Create or update the Ethernet address mapping for an IPv4 address.
    ///
    /// Returns the IPv4 address whose mapping was evicted to make room, if
    /// any.
    pub fn set_eth_addr_for_ip(
        &mut self,
        ipv4_addr: Ipv4Address,
        eth_addr: EthernetAddress,
    ) -> Option<Ipv4Address> {
        let now = self.tick();

        if let Some(entry) = self.entries
            .iter_mut()
            .find(|entry| entry.ipv4_addr == ipv4_addr)
        {
            entry.eth_addr = eth_addr;
            entry.last_used = now;
            return None;
        }

        let entry = Entry {
            ipv4_addr,
            eth_addr,
            last_used: now,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(entry);
            return None;
        }

        // Full, replace whichever mapping went unused the longest.
        let lru = self.entries
            .iter_mut()
            .min_by_key(|entry| entry.last_used)?;
        let evicted = lru.ipv4_addr;
        *lru = entry;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl Default for ArpCache {
    fn default() -> ArpCache {
        ArpCache::new(Self::DEFAULT_CAPACITY)
    }
}
