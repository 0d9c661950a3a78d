use alloc::sync::{
    Arc,
    Weak,
};

use crate::repr::{
    eth_types,
    EthernetAddress,
    Ipv4Address,
    Ipv4Packet,
    Ipv4Repr,
};
use crate::service::{
    ArpService,
    EthernetHandler,
    EthernetService,
    Handle,
    Registry,
    Verdict,
};
use crate::{
    Error,
    Result,
};

/// A protocol carried inside IPv4 datagrams.
pub trait Ipv4Handler: Send + Sync {
    /// Processes the payload of a datagram addressed to us.
    ///
    /// Returning `Verdict::Reply` means the payload has been rewritten in
    /// place, checksum included, and should go back to src_addr.
    fn recv_ipv4(&self, src_addr: Ipv4Address, dst_addr: Ipv4Address, payload: &mut [u8])
        -> Verdict;
}

/// Sends and receives IPv4 datagrams, routing them over a single link.
pub struct Ipv4Service {
    ethernet: Arc<EthernetService>,
    arp: Arc<ArpService>,
    default_gateway: Ipv4Address,
    subnet_mask: Ipv4Address,
    handlers: Registry<u8, dyn Ipv4Handler>,
    handle: Handle,
}

impl Ipv4Service {
    /// Creates the IPv4 service and registers it for IPv4 frames.
    pub fn new(
        ethernet: Arc<EthernetService>,
        arp: Arc<ArpService>,
        default_gateway: Ipv4Address,
        subnet_mask: Ipv4Address,
    ) -> Arc<Ipv4Service> {
        if !default_gateway.is_same_subnet(ethernet.ipv4_addr(), subnet_mask) {
            warn!(
                "Default gateway {} is not on the subnet of {}.",
                default_gateway,
                ethernet.ipv4_addr()
            );
        }

        Arc::new_cyclic(|weak: &Weak<Ipv4Service>| {
            let handler: Weak<dyn EthernetHandler> = weak.clone();
            let handle = ethernet.register(eth_types::IPV4, handler);

            Ipv4Service {
                ethernet,
                arp,
                default_gateway,
                subnet_mask,
                handlers: Registry::new(),
                handle,
            }
        })
    }

    pub fn ipv4_addr(&self) -> Ipv4Address {
        self.ethernet.ipv4_addr()
    }

    pub fn default_gateway(&self) -> Ipv4Address {
        self.default_gateway
    }

    pub fn subnet_mask(&self) -> Ipv4Address {
        self.subnet_mask
    }

    /// Registers the handler for datagrams with the given protocol number.
    pub fn register(&self, protocol: u8, handler: Weak<dyn Ipv4Handler>) -> Handle {
        debug!("Registering handler for IPv4 protocol {}.", protocol);
        self.handlers.register(protocol, handler)
    }

    pub fn unregister(&self, protocol: u8, handle: Handle) -> bool {
        self.handlers.unregister(protocol, handle)
    }

    /// Returns the IPv4 address a datagram for dst_addr is handed to on the
    /// link, i.e. dst_addr itself or the default gateway.
    pub fn next_hop(&self, dst_addr: Ipv4Address) -> Ipv4Address {
        if dst_addr.is_broadcast() || dst_addr.is_same_subnet(self.ipv4_addr(), self.subnet_mask) {
            dst_addr
        } else {
            self.default_gateway
        }
    }

    /// Sends an IPv4 datagram carrying a copy of payload.
    pub fn send(&self, dst_addr: Ipv4Address, protocol: u8, payload: &[u8]) -> Result<()> {
        self.send_packet(dst_addr, protocol, payload.len(), |payload_| {
            payload_.copy_from_slice(payload);
            Ok(())
        })
    }

    /// Sends an IPv4 datagram with a payload of payload_len bytes written by
    /// f.
    ///
    /// Resolving the next hop may block, see `ArpService::resolve(...)`.
    pub fn send_packet<F>(
        &self,
        dst_addr: Ipv4Address,
        protocol: u8,
        payload_len: usize,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        let ipv4_packet_len = Ipv4Packet::<&[u8]>::buffer_len(payload_len);
        if ipv4_packet_len > Ipv4Packet::<&[u8]>::MAX_PACKET_LEN {
            warn!("Refusing to send {} byte IPv4 datagram.", ipv4_packet_len);
            return Err(Error::Exhausted);
        }

        let ipv4_repr = Ipv4Repr {
            src_addr: self.ipv4_addr(),
            dst_addr,
            protocol,
            payload_len: payload_len as u16,
        };

        let next_hop = self.next_hop(dst_addr);
        let eth_addr = if next_hop.is_broadcast() {
            EthernetAddress::BROADCAST
        } else {
            self.arp.resolve(next_hop)?
        };

        trace!(
            "Sending IPv4 datagram with protocol {} to {} via {}.",
            protocol,
            dst_addr,
            eth_addr
        );

        self.ethernet
            .send_frame(eth_addr, eth_types::IPV4, ipv4_packet_len, |ipv4_buffer| {
                ipv4_repr.serialize(ipv4_buffer)?;
                f(&mut ipv4_buffer[Ipv4Packet::<&[u8]>::HEADER_LEN ..])
            })
    }
}

impl EthernetHandler for Ipv4Service {
    fn recv_ethernet(&self, payload: &mut [u8]) -> Verdict {
        let mut ipv4_packet = match Ipv4Packet::try_new(payload) {
            Ok(ipv4_packet) => ipv4_packet,
            Err(err) => {
                debug!("Ignoring IPv4 datagram with {:?}.", err);
                return Verdict::Drop;
            }
        };

        if let Err(err) = ipv4_packet.check_encoding() {
            debug!("Ignoring IPv4 datagram with {:?}.", err);
            return Verdict::Drop;
        }

        let src_addr = ipv4_packet.src_addr();
        let dst_addr = ipv4_packet.dst_addr();
        if dst_addr != self.ipv4_addr() {
            debug!("Ignoring IPv4 datagram with destination {}.", dst_addr);
            return Verdict::Drop;
        }

        let protocol = ipv4_packet.protocol();
        let handler = match self.handlers.lookup(protocol) {
            Some(handler) => handler,
            None => {
                debug!("Ignoring IPv4 datagram with protocol {}.", protocol);
                return Verdict::Drop;
            }
        };

        trace!(
            "Received IPv4 datagram with protocol {} from {}.",
            protocol,
            src_addr
        );

        match handler.recv_ipv4(src_addr, dst_addr, ipv4_packet.payload_mut()) {
            Verdict::Reply => {
                ipv4_packet.set_src_addr(dst_addr);
                ipv4_packet.set_dst_addr(src_addr);
                ipv4_packet.set_ttl(Ipv4Repr::DEFAULT_TTL);
                ipv4_packet.fill_checksum();
                Verdict::Reply
            }
            Verdict::Drop => Verdict::Drop,
        }
    }
}

impl Drop for Ipv4Service {
    fn drop(&mut self) {
        self.ethernet.unregister(eth_types::IPV4, self.handle);
    }
}
