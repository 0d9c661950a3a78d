#![allow(dead_code)]

use std::sync::{
    Arc,
    Mutex,
    Weak,
};

use dracnet::link::{
    self,
    Link,
};
use dracnet::repr::{
    eth_types,
    ipv4_protocols,
    Arp,
    ArpOp,
    EthernetAddress,
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
    Ipv4Repr,
};
use dracnet::service::{
    Config,
    EthernetService,
    Received,
    Stack,
};

lazy_static! {
    pub static ref IPV4_ADDR: Ipv4Address = "10.0.2.15".parse().unwrap();
    pub static ref ETHERNET_ADDR: EthernetAddress = "52:54:00:12:34:56".parse().unwrap();
    pub static ref GATEWAY_IPV4: Ipv4Address = "10.0.2.2".parse().unwrap();
    pub static ref GATEWAY_ETH: EthernetAddress = "52:55:0A:00:02:02".parse().unwrap();
    pub static ref SUBNET_MASK: Ipv4Address = "255.255.255.0".parse().unwrap();
}

/// A host on the other end of the link.
#[derive(Clone, Copy, Debug)]
pub struct Peer {
    pub ipv4_addr: Ipv4Address,
    pub eth_addr: EthernetAddress,
    /// Answers ARP requests for ipv4_addr.
    pub answers_arp: bool,
    /// Answers echo requests sent to eth_addr, whatever the IPv4 destination.
    pub answers_ping: bool,
}

impl Peer {
    pub fn gateway() -> Peer {
        Peer {
            ipv4_addr: *GATEWAY_IPV4,
            eth_addr: *GATEWAY_ETH,
            answers_arp: true,
            answers_ping: true,
        }
    }

    fn answer(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let eth_frame = EthernetFrame::try_new(frame).ok()?;

        match eth_frame.payload_type() {
            eth_types::ARP if self.answers_arp => {
                let arp = Arp::deserialize(eth_frame.payload()).ok()?;
                if arp.op != ArpOp::Request || arp.target_proto_addr != self.ipv4_addr {
                    return None;
                }

                let reply = Arp {
                    op: ArpOp::Reply,
                    source_hw_addr: self.eth_addr,
                    source_proto_addr: self.ipv4_addr,
                    target_hw_addr: arp.source_hw_addr,
                    target_proto_addr: arp.source_proto_addr,
                };
                let mut payload = vec![0; reply.buffer_len()];
                reply.serialize(&mut payload[..]).ok()?;
                Some(ethernet_frame(
                    arp.source_hw_addr,
                    self.eth_addr,
                    eth_types::ARP,
                    &payload,
                ))
            }
            eth_types::IPV4 if self.answers_ping && eth_frame.dst_addr() == self.eth_addr => {
                let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).ok()?;
                if ipv4_packet.protocol() != ipv4_protocols::ICMP {
                    return None;
                }

                let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload()).ok()?;
                let (id, seq) = match Icmpv4Repr::deserialize(&icmp_packet).ok()? {
                    Icmpv4Repr::EchoRequest { id, seq } => (id, seq),
                    _ => return None,
                };

                Some(ethernet_frame(
                    eth_frame.src_addr(),
                    self.eth_addr,
                    eth_types::IPV4,
                    &ipv4_datagram(
                        ipv4_packet.dst_addr(),
                        ipv4_packet.src_addr(),
                        &icmp_message(Icmpv4Repr::EchoReply { id, seq }, icmp_packet.payload()),
                    ),
                ))
            }
            _ => None,
        }
    }
}

/// A link that records every frame the stack sends and lets peers answer
/// them.
///
/// Answers are delivered synchronously from within `send(...)`, the same way
/// a receive interrupt could fire while the stack is transmitting.
pub struct MockLink {
    sent: Mutex<Vec<Vec<u8>>>,
    peers: Mutex<Vec<Peer>>,
    ethernet: Mutex<Weak<EthernetService>>,
}

impl MockLink {
    pub fn new(peers: Vec<Peer>) -> MockLink {
        MockLink {
            sent: Mutex::new(Vec::new()),
            peers: Mutex::new(peers),
            ethernet: Mutex::new(Weak::new()),
        }
    }

    /// Connects the receive side of the link to a stack.
    pub fn attach(&self, ethernet: &Arc<EthernetService>) {
        *self.ethernet.lock().unwrap() = Arc::downgrade(ethernet);
    }

    /// Returns every frame sent so far, including replies to delivered frames.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the sent frames with the given EtherType.
    pub fn sent_with_type(&self, eth_type: u16) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter(|frame| {
                EthernetFrame::try_new(&frame[..])
                    .map(|eth_frame| eth_frame.payload_type() == eth_type)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Hands a received frame to the stack like a driver would, transmitting
    /// the reply if there is one.
    pub fn deliver(&self, mut frame: Vec<u8>) -> Option<Vec<u8>> {
        let ethernet = self.ethernet.lock().unwrap().upgrade()?;

        match ethernet.recv_frame(&mut frame[..]) {
            Received::Reply(reply) => {
                let reply = reply.to_vec();
                self.sent.lock().unwrap().push(reply.clone());
                Some(reply)
            }
            Received::Dropped => None,
        }
    }
}

impl Link for MockLink {
    fn send(&self, frame: &[u8]) -> link::Result<()> {
        self.sent.lock().unwrap().push(frame.to_vec());

        let answers: Vec<Vec<u8>> = self.peers
            .lock()
            .unwrap()
            .iter()
            .filter_map(|peer| peer.answer(frame))
            .collect();

        for answer in answers {
            self.deliver(answer);
        }

        Ok(())
    }

    fn ethernet_addr(&self) -> EthernetAddress {
        *ETHERNET_ADDR
    }

    fn ipv4_addr(&self) -> Ipv4Address {
        *IPV4_ADDR
    }
}

pub struct Context {
    pub link: Arc<MockLink>,
    pub stack: Stack,
}

/// Creates a stack on a link shared with the given peers.
pub fn with_peers(peers: Vec<Peer>) -> Context {
    let _ = env_logger::try_init();

    let link = Arc::new(MockLink::new(peers));
    let stack = Stack::new(link.clone(), Config::new(*GATEWAY_IPV4, *SUBNET_MASK));
    link.attach(&stack.ethernet);

    Context { link, stack }
}

/// Creates a stack whose only neighbour is a responsive default gateway.
pub fn with_gateway() -> Context {
    with_peers(vec![Peer::gateway()])
}

pub fn ethernet_frame(
    dst_addr: EthernetAddress,
    src_addr: EthernetAddress,
    eth_type: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0; EthernetFrame::<&[u8]>::buffer_len(payload.len())];
    {
        let mut eth_frame = EthernetFrame::try_new(&mut buffer[..]).unwrap();
        eth_frame.set_dst_addr(dst_addr);
        eth_frame.set_src_addr(src_addr);
        eth_frame.set_payload_type(eth_type);
        eth_frame.payload_mut().copy_from_slice(payload);
    }
    buffer
}

pub fn ipv4_datagram(src_addr: Ipv4Address, dst_addr: Ipv4Address, icmp: &[u8]) -> Vec<u8> {
    let ipv4_repr = Ipv4Repr {
        src_addr,
        dst_addr,
        protocol: ipv4_protocols::ICMP,
        payload_len: icmp.len() as u16,
    };
    let mut buffer = vec![0; ipv4_repr.buffer_len()];
    ipv4_repr.serialize(&mut buffer[..]).unwrap();
    buffer[Ipv4Packet::<&[u8]>::HEADER_LEN ..].copy_from_slice(icmp);
    buffer
}

pub fn icmp_message(icmp_repr: Icmpv4Repr, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; icmp_repr.buffer_len() + payload.len()];
    let mut icmp_packet = Icmpv4Packet::try_new(&mut buffer[..]).unwrap();
    icmp_packet.payload_mut().copy_from_slice(payload);
    icmp_repr.serialize(&mut icmp_packet);
    buffer
}
