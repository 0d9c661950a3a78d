use alloc::collections::VecDeque;
use alloc::sync::{
    Arc,
    Weak,
};
use core::sync::atomic::{
    AtomicU16,
    Ordering,
};

use spin::Mutex;

use crate::repr::{
    ipv4_protocols,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
};
use crate::service::{
    Handle,
    Ipv4Handler,
    Ipv4Service,
    Verdict,
};
use crate::Result;

/// An echo reply received in answer to one of our pings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EchoReply {
    pub src_addr: Ipv4Address,
    pub id: u16,
    pub seq: u16,
}

/// Answers pings and sends our own.
pub struct Icmpv4Service {
    ipv4: Arc<Ipv4Service>,
    replies: Mutex<VecDeque<EchoReply>>,
    next_seq: AtomicU16,
    handle: Handle,
}

impl Icmpv4Service {
    /// Identifier carried by every echo request we send.
    pub const PING_IDENT: u16 = 0x1337;

    /// Number of unread echo replies kept before the oldest is discarded.
    pub const MAX_QUEUED_REPLIES: usize = 16;

    /// Creates the ICMP service and registers it for ICMP datagrams.
    pub fn new(ipv4: Arc<Ipv4Service>) -> Arc<Icmpv4Service> {
        Arc::new_cyclic(|weak: &Weak<Icmpv4Service>| {
            let handler: Weak<dyn Ipv4Handler> = weak.clone();
            let handle = ipv4.register(ipv4_protocols::ICMP, handler);

            Icmpv4Service {
                ipv4,
                replies: Mutex::new(VecDeque::with_capacity(Self::MAX_QUEUED_REPLIES)),
                next_seq: AtomicU16::new(1),
                handle,
            }
        })
    }

    /// Sends an echo request to ipv4_addr, returning its sequence number.
    ///
    /// Replies show up in `recv_reply()`.
    pub fn ping(&self, ipv4_addr: Ipv4Address) -> Result<u16> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let icmp_repr = Icmpv4Repr::EchoRequest {
            id: Self::PING_IDENT,
            seq,
        };

        debug!("Sending ICMP echo request {} to {}.", seq, ipv4_addr);

        self.ipv4.send_packet(
            ipv4_addr,
            ipv4_protocols::ICMP,
            icmp_repr.buffer_len(),
            |icmp_buffer| {
                let mut icmp_packet = Icmpv4Packet::try_new(icmp_buffer)?;
                icmp_repr.serialize(&mut icmp_packet);
                Ok(())
            },
        )?;

        Ok(seq)
    }

    /// Takes the oldest unread echo reply.
    pub fn recv_reply(&self) -> Option<EchoReply> {
        self.replies.lock().pop_front()
    }

    /// Runs on the receive path, so a queue held by the interrupted context
    /// costs the reply rather than a deadlock.
    fn queue_reply(&self, reply: EchoReply) {
        let mut replies = match self.replies.try_lock() {
            Some(replies) => replies,
            None => {
                debug!("Reply queue busy, dropping echo reply {:?}.", reply);
                return;
            }
        };
        if replies.len() == Self::MAX_QUEUED_REPLIES {
            replies.pop_front();
        }
        replies.push_back(reply);
    }
}

impl Ipv4Handler for Icmpv4Service {
    fn recv_ipv4(
        &self,
        src_addr: Ipv4Address,
        _dst_addr: Ipv4Address,
        payload: &mut [u8],
    ) -> Verdict {
        let mut icmp_packet = match Icmpv4Packet::try_new(payload) {
            Ok(icmp_packet) => icmp_packet,
            Err(err) => {
                debug!("Ignoring ICMP packet with {:?}.", err);
                return Verdict::Drop;
            }
        };

        if let Err(err) = icmp_packet.check_encoding() {
            debug!("Ignoring ICMP packet with {:?}.", err);
            return Verdict::Drop;
        }

        match Icmpv4Repr::deserialize(&icmp_packet) {
            Ok(Icmpv4Repr::EchoRequest { id, seq }) => {
                debug!("Answering ICMP echo request {} from {}.", seq, src_addr);
                // Payload is echoed untouched.
                Icmpv4Repr::EchoReply { id, seq }.serialize(&mut icmp_packet);
                Verdict::Reply
            }
            Ok(Icmpv4Repr::EchoReply { id, seq }) => {
                info!(
                    "Received ICMP echo reply from {} (id: 0x{:04X}, seq: {}).",
                    src_addr, id, seq
                );
                self.queue_reply(EchoReply { src_addr, id, seq });
                Verdict::Drop
            }
            Err(_) => {
                debug!(
                    "Ignoring ICMP packet with type {} code {}.",
                    icmp_packet._type(),
                    icmp_packet.code()
                );
                Verdict::Drop
            }
        }
    }
}

impl Drop for Icmpv4Service {
    fn drop(&mut self) {
        self.ipv4.unregister(ipv4_protocols::ICMP, self.handle);
    }
}
