use alloc::sync::{
    Arc,
    Weak,
};
use alloc::vec::Vec;
use core::sync::atomic::{
    AtomicUsize,
    Ordering,
};

use crate::link::Link;
use crate::repr::{
    EthernetAddress,
    EthernetFrame,
    Ipv4Address,
};
use crate::service::{
    Handle,
    Registry,
    Verdict,
};
use crate::{
    Error,
    Result,
};

/// A protocol carried directly inside Ethernet frames.
pub trait EthernetHandler: Send + Sync {
    /// Processes the payload of a frame addressed to us.
    ///
    /// Returning `Verdict::Reply` means the payload has been rewritten in
    /// place and the frame should go back to its sender.
    fn recv_ethernet(&self, payload: &mut [u8]) -> Verdict;
}

/// What the driver should do with a frame after `recv_frame(...)`.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<'a> {
    Dropped,
    /// The frame was rewritten into a reply, addressed back to its sender, and
    /// should be transmitted as is.
    Reply(&'a [u8]),
}

/// Sends frames over a link and dispatches received frames by EtherType.
pub struct EthernetService {
    link: Arc<dyn Link>,
    handlers: Registry<u16, dyn EthernetHandler>,
    dispatching: AtomicUsize,
}

/// Marks the service as dispatching until dropped.
struct DispatchGuard<'a>(&'a AtomicUsize);

impl<'a> DispatchGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> DispatchGuard<'a> {
        depth.fetch_add(1, Ordering::SeqCst);
        DispatchGuard(depth)
    }
}

impl<'a> Drop for DispatchGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EthernetService {
    pub fn new(link: Arc<dyn Link>) -> EthernetService {
        EthernetService {
            link,
            handlers: Registry::new(),
            dispatching: AtomicUsize::new(0),
        }
    }

    pub fn ethernet_addr(&self) -> EthernetAddress {
        self.link.ethernet_addr()
    }

    pub fn ipv4_addr(&self) -> Ipv4Address {
        self.link.ipv4_addr()
    }

    /// Registers the handler for frames with the given EtherType.
    pub fn register(&self, eth_type: u16, handler: Weak<dyn EthernetHandler>) -> Handle {
        debug!("Registering handler for EtherType 0x{:04X}.", eth_type);
        self.handlers.register(eth_type, handler)
    }

    pub fn unregister(&self, eth_type: u16, handle: Handle) -> bool {
        self.handlers.unregister(eth_type, handle)
    }

    /// Checks if a received frame is currently being processed, i.e. we are
    /// running on the driver's interrupt path.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst) > 0
    }

    /// Sends an Ethernet frame carrying a copy of payload.
    pub fn send(&self, dst_addr: EthernetAddress, eth_type: u16, payload: &[u8]) -> Result<()> {
        self.send_frame(dst_addr, eth_type, payload.len(), |payload_| {
            payload_.copy_from_slice(payload);
            Ok(())
        })
    }

    /// Sends an Ethernet frame with a payload of payload_len bytes written by
    /// f.
    ///
    /// The frame is assembled in a scratch buffer which is released once the
    /// link has taken its copy.
    pub fn send_frame<F>(
        &self,
        dst_addr: EthernetAddress,
        eth_type: u16,
        payload_len: usize,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut [u8]) -> Result<()>,
    {
        let eth_frame_len = EthernetFrame::<&[u8]>::buffer_len(payload_len);
        if eth_frame_len > self.link.max_transmission_unit() {
            warn!(
                "Refusing to send {} byte frame over a link with MTU {}.",
                eth_frame_len,
                self.link.max_transmission_unit()
            );
            return Err(Error::Exhausted);
        }

        let mut eth_buffer: Vec<u8> = Vec::new();
        if eth_buffer.try_reserve_exact(eth_frame_len).is_err() {
            warn!("Unable to allocate {} byte frame.", eth_frame_len);
            return Err(Error::Exhausted);
        }
        eth_buffer.resize(eth_frame_len, 0);

        let mut eth_frame = EthernetFrame::try_new(&mut eth_buffer[..])?;
        eth_frame.set_dst_addr(dst_addr);
        eth_frame.set_src_addr(self.link.ethernet_addr());
        eth_frame.set_payload_type(eth_type);
        f(eth_frame.payload_mut())?;

        trace!(
            "Sending frame with type 0x{:04X} to {}.",
            eth_type,
            dst_addr
        );
        self.link.send(eth_frame.as_ref())?;
        Ok(())
    }

    /// Receives an Ethernet frame from the driver.
    ///
    /// Frames not addressed to us, or with an EtherType nobody handles, are
    /// dropped untouched. If the handler produced a reply, the frame is
    /// readdressed to its sender and handed back for transmission.
    pub fn recv_frame<'a>(&self, eth_buffer: &'a mut [u8]) -> Received<'a> {
        let _guard = DispatchGuard::enter(&self.dispatching);

        let verdict = {
            let mut eth_frame = match EthernetFrame::try_new(&mut eth_buffer[..]) {
                Ok(eth_frame) => eth_frame,
                Err(err) => {
                    debug!("Ignoring ethernet frame with {:?}.", err);
                    return Received::Dropped;
                }
            };

            let eth_addr = self.link.ethernet_addr();
            if eth_frame.dst_addr() != eth_addr && !eth_frame.dst_addr().is_broadcast() {
                debug!(
                    "Ignoring ethernet frame with destination {}.",
                    eth_frame.dst_addr()
                );
                return Received::Dropped;
            }

            let handler = match self.handlers.lookup(eth_frame.payload_type()) {
                Some(handler) => handler,
                None => {
                    debug!(
                        "Ignoring ethernet frame with type 0x{:04X}.",
                        eth_frame.payload_type()
                    );
                    return Received::Dropped;
                }
            };

            let verdict = handler.recv_ethernet(eth_frame.payload_mut());
            if verdict == Verdict::Reply {
                let src_addr = eth_frame.src_addr();
                eth_frame.set_dst_addr(src_addr);
                eth_frame.set_src_addr(eth_addr);
            }
            verdict
        };

        match verdict {
            Verdict::Reply => Received::Reply(eth_buffer),
            Verdict::Drop => Received::Dropped,
        }
    }
}
