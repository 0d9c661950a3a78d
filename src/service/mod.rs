//! Packet processing services for different network layers.
//!
//! The `service` module deals with packet transmission and reception logic at
//! different layers of the network stack. Each layer registers itself with
//! the layer below it when constructed and unregisters when dropped.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;
pub mod registry;

use alloc::sync::Arc;

use crate::arp_cache::ArpCache;
use crate::link::Link;
use crate::repr::Ipv4Address;

pub use self::arp::ArpService;
pub use self::ethernet::{
    EthernetHandler,
    EthernetService,
    Received,
};
pub use self::icmpv4::{
    EchoReply,
    Icmpv4Service,
};
pub use self::ipv4::{
    Ipv4Handler,
    Ipv4Service,
};
pub use self::registry::{
    Handle,
    Registry,
};

/// What a layer wants done with a packet it has processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing further to do with the buffer.
    Drop,
    /// The buffer was rewritten in place into a reply and should be sent back
    /// to where it came from.
    Reply,
}

/// Addressing and ARP settings, fixed for the lifetime of the stack.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Default gateway for IPv4 packets not on the interface subnet. This
    /// should be on the same subnet as the link address!
    pub default_gateway: Ipv4Address,
    /// Subnet mask of the link address.
    pub subnet_mask: Ipv4Address,
    /// Maximum number of IPv4 -> Ethernet mappings kept in the ARP cache.
    pub arp_cache_capacity: usize,
    /// Number of times the ARP cache is polled after sending a request before
    /// resolution gives up.
    pub arp_resolve_attempts: usize,
}

impl Config {
    pub const DEFAULT_ARP_RESOLVE_ATTEMPTS: usize = 128;

    pub fn new(default_gateway: Ipv4Address, subnet_mask: Ipv4Address) -> Config {
        Config {
            default_gateway,
            subnet_mask,
            arp_cache_capacity: ArpCache::DEFAULT_CAPACITY,
            arp_resolve_attempts: Self::DEFAULT_ARP_RESOLVE_ATTEMPTS,
        }
    }
}

/// The complete stack for one link, wired together at boot.
///
/// Dropping the stack unregisters every layer.
pub struct Stack {
    pub ethernet: Arc<EthernetService>,
    pub arp: Arc<ArpService>,
    pub ipv4: Arc<Ipv4Service>,
    pub icmpv4: Arc<Icmpv4Service>,
}

impl Stack {
    pub fn new(link: Arc<dyn Link>, config: Config) -> Stack {
        let ethernet = Arc::new(EthernetService::new(link));
        let arp = ArpService::new(
            ethernet.clone(),
            ArpCache::new(config.arp_cache_capacity),
            config.arp_resolve_attempts,
        );
        let ipv4 = Ipv4Service::new(
            ethernet.clone(),
            arp.clone(),
            config.default_gateway,
            config.subnet_mask,
        );
        let icmpv4 = Icmpv4Service::new(ipv4.clone());

        info!(
            "Network up with IPv4 = {}, MAC = {}, gateway = {}, mask = {}.",
            ethernet.ipv4_addr(),
            ethernet.ethernet_addr(),
            config.default_gateway,
            config.subnet_mask
        );

        Stack {
            ethernet,
            arp,
            ipv4,
            icmpv4,
        }
    }
}
