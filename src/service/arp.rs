use alloc::sync::{
    Arc,
    Weak,
};

use spin::Mutex;

use crate::arp_cache::ArpCache;
use crate::repr::{
    eth_types,
    Arp,
    ArpOp,
    EthernetAddress,
    Ipv4Address,
};
use crate::service::{
    EthernetHandler,
    EthernetService,
    Handle,
    Verdict,
};
use crate::{
    Error,
    Result,
};

/// Resolves IPv4 addresses of neighbours to Ethernet addresses and answers
/// their requests for ours.
pub struct ArpService {
    ethernet: Arc<EthernetService>,
    cache: Mutex<ArpCache>,
    resolve_attempts: usize,
    handle: Handle,
}

impl ArpService {
    /// Creates the ARP service and registers it for ARP frames.
    pub fn new(
        ethernet: Arc<EthernetService>,
        cache: ArpCache,
        resolve_attempts: usize,
    ) -> Arc<ArpService> {
        Arc::new_cyclic(|weak: &Weak<ArpService>| {
            let handler: Weak<dyn EthernetHandler> = weak.clone();
            let handle = ethernet.register(eth_types::ARP, handler);

            ArpService {
                ethernet,
                cache: Mutex::new(cache),
                resolve_attempts,
                handle,
            }
        })
    }

    /// Sends an ARP packet to an Ethernet address.
    pub fn send_packet(&self, arp: &Arp, dst_addr: EthernetAddress) -> Result<()> {
        self.ethernet
            .send_frame(dst_addr, eth_types::ARP, arp.buffer_len(), |payload| {
                arp.serialize(payload)
            })
    }

    /// Broadcasts a request for the Ethernet address of ipv4_addr.
    ///
    /// The answer arrives asynchronously and lands in the cache.
    pub fn request(&self, ipv4_addr: Ipv4Address) -> Result<()> {
        let arp = Arp {
            op: ArpOp::Request,
            source_hw_addr: self.ethernet.ethernet_addr(),
            source_proto_addr: self.ethernet.ipv4_addr(),
            target_hw_addr: EthernetAddress::BROADCAST,
            target_proto_addr: ipv4_addr,
        };

        debug!("Sending ARP request for {}.", ipv4_addr);
        self.send_packet(&arp, EthernetAddress::BROADCAST)
    }

    /// Looks up ipv4_addr in the cache without touching the network.
    ///
    /// While a received frame is being dispatched the cache is only tried, so
    /// a lookup that interrupted another user of the cache misses instead of
    /// spinning forever.
    pub fn lookup(&self, ipv4_addr: Ipv4Address) -> Option<EthernetAddress> {
        if self.ethernet.is_dispatching() {
            self.cache.try_lock()?.eth_addr_for_ip(ipv4_addr)
        } else {
            self.cache.lock().eth_addr_for_ip(ipv4_addr)
        }
    }

    /// Adds a mapping to the cache, e.g. a statically configured neighbour.
    ///
    /// Not for use on the receive path, which must never wait for the cache.
    pub fn insert(&self, ipv4_addr: Ipv4Address, eth_addr: EthernetAddress) {
        if let Some(evicted) = self.cache.lock().set_eth_addr_for_ip(ipv4_addr, eth_addr) {
            debug!("Evicted ARP mapping for {}.", evicted);
        }
    }

    /// Resolves ipv4_addr to an Ethernet address, blocking until the answer
    /// arrives or the attempts run out.
    ///
    /// See `resolve_with(...)`.
    pub fn resolve(&self, ipv4_addr: Ipv4Address) -> Result<EthernetAddress> {
        self.resolve_with(ipv4_addr, core::hint::spin_loop)
    }

    /// Resolves ipv4_addr to an Ethernet address.
    ///
    /// On a cache miss a request is broadcast and the cache is polled, calling
    /// relax before each of the configured number of attempts. The reply can
    /// only be delivered by the driver's receive path running in the meantime,
    /// i.e. interrupts must stay enabled. For the same reason a miss while
    /// dispatching a received frame fails immediately with
    /// `Error::InterruptContext`.
    pub fn resolve_with<F>(&self, ipv4_addr: Ipv4Address, mut relax: F) -> Result<EthernetAddress>
    where
        F: FnMut(),
    {
        if let Some(eth_addr) = self.lookup(ipv4_addr) {
            return Ok(eth_addr);
        }

        if self.ethernet.is_dispatching() {
            warn!(
                "Unable to resolve {} while processing a received frame.",
                ipv4_addr
            );
            return Err(Error::InterruptContext);
        }

        self.request(ipv4_addr)?;

        for _ in 0 .. self.resolve_attempts {
            relax();
            if let Some(eth_addr) = self.lookup(ipv4_addr) {
                return Ok(eth_addr);
            }
        }

        warn!("ARP resolve for {} timed out.", ipv4_addr);
        Err(Error::MacResolution(ipv4_addr))
    }

    /// Tells ipv4_addr about our own addresses with an unsolicited reply.
    pub fn announce(&self, ipv4_addr: Ipv4Address) -> Result<()> {
        let eth_addr = self.resolve(ipv4_addr)?;
        let arp = Arp {
            op: ArpOp::Reply,
            source_hw_addr: self.ethernet.ethernet_addr(),
            source_proto_addr: self.ethernet.ipv4_addr(),
            target_hw_addr: eth_addr,
            target_proto_addr: ipv4_addr,
        };

        debug!("Announcing ourselves to {}/{}.", ipv4_addr, eth_addr);
        self.send_packet(&arp, eth_addr)
    }
}

impl EthernetHandler for ArpService {
    fn recv_ethernet(&self, payload: &mut [u8]) -> Verdict {
        let arp = match Arp::deserialize(payload) {
            Ok(arp) => arp,
            Err(err) => {
                debug!("Ignoring ARP packet with {:?}.", err);
                return Verdict::Drop;
            }
        };

        let ipv4_addr = self.ethernet.ipv4_addr();
        if arp.target_proto_addr != ipv4_addr {
            debug!(
                "Ignoring ARP with target IPv4 address {}.",
                arp.target_proto_addr
            );
            return Verdict::Drop;
        }

        trace!("Received {}.", arp);

        match arp.op {
            ArpOp::Request => {
                let reply = Arp {
                    op: ArpOp::Reply,
                    source_hw_addr: self.ethernet.ethernet_addr(),
                    source_proto_addr: ipv4_addr,
                    target_hw_addr: arp.source_hw_addr,
                    target_proto_addr: arp.source_proto_addr,
                };

                debug!(
                    "Sending ARP reply to {}/{}.",
                    reply.target_proto_addr, reply.target_hw_addr
                );

                match reply.serialize(payload) {
                    Ok(()) => Verdict::Reply,
                    Err(_) => Verdict::Drop,
                }
            }
            ArpOp::Reply => {
                // The interrupted context may hold the cache, in which case the
                // mapping is lost and a pending resolve will time out.
                let mut cache = match self.cache.try_lock() {
                    Some(cache) => cache,
                    None => {
                        debug!(
                            "ARP cache busy, dropping mapping from {} to {}.",
                            arp.source_proto_addr, arp.source_hw_addr
                        );
                        return Verdict::Drop;
                    }
                };

                debug!(
                    "Received ARP, adding mapping from {} to {}.",
                    arp.source_proto_addr, arp.source_hw_addr
                );
                if let Some(evicted) =
                    cache.set_eth_addr_for_ip(arp.source_proto_addr, arp.source_hw_addr)
                {
                    debug!("Evicted ARP mapping for {}.", evicted);
                }
                Verdict::Drop
            }
        }
    }
}

impl Drop for ArpService {
    fn drop(&mut self) {
        self.ethernet.unregister(eth_types::ARP, self.handle);
    }
}
