#[macro_use]
extern crate assert_matches;
extern crate dracnet;
extern crate env_logger;
#[macro_use]
extern crate lazy_static;

mod context;

use dracnet::repr::{
    eth_types,
    ipv4_protocols,
    Arp,
    EthernetAddress,
    EthernetFrame,
    Ipv4Address,
    Ipv4Packet,
};
use dracnet::service::{
    EchoReply,
    Received,
};
use dracnet::Error;

use crate::context::Peer;

#[test]
fn same_subnet_is_direct() {
    let neighbour = Peer {
        ipv4_addr: Ipv4Address::new([10, 0, 2, 3]),
        eth_addr: EthernetAddress::new([0x52, 0x55, 0x0A, 0x00, 0x02, 0x03]),
        answers_arp: true,
        answers_ping: true,
    };
    let context = context::with_peers(vec![Peer::gateway(), neighbour]);

    assert_eq!(
        context.stack.ipv4.next_hop(neighbour.ipv4_addr),
        neighbour.ipv4_addr
    );
    context.stack.icmpv4.ping(neighbour.ipv4_addr).unwrap();

    let requests = context.link.sent_with_type(eth_types::ARP);
    assert_eq!(requests.len(), 1);
    let eth_frame = EthernetFrame::try_new(&requests[0][..]).unwrap();
    let arp = Arp::deserialize(eth_frame.payload()).unwrap();
    assert_eq!(arp.target_proto_addr, neighbour.ipv4_addr);

    let datagrams = context.link.sent_with_type(eth_types::IPV4);
    let eth_frame = EthernetFrame::try_new(&datagrams[0][..]).unwrap();
    assert_eq!(eth_frame.dst_addr(), neighbour.eth_addr);

    assert_matches!(
        context.stack.icmpv4.recv_reply(),
        Some(EchoReply { src_addr, .. }) if src_addr == neighbour.ipv4_addr
    );
}

#[test]
fn other_subnet_goes_via_gateway() {
    let context = context::with_gateway();
    let remote = Ipv4Address::new([8, 8, 8, 8]);

    assert_eq!(context.stack.ipv4.next_hop(remote), *context::GATEWAY_IPV4);
    context.stack.icmpv4.ping(remote).unwrap();

    // The gateway, not the remote host, gets resolved.
    let requests = context.link.sent_with_type(eth_types::ARP);
    assert_eq!(requests.len(), 1);
    let eth_frame = EthernetFrame::try_new(&requests[0][..]).unwrap();
    let arp = Arp::deserialize(eth_frame.payload()).unwrap();
    assert_eq!(arp.target_proto_addr, *context::GATEWAY_IPV4);

    let datagrams = context.link.sent_with_type(eth_types::IPV4);
    assert_eq!(datagrams.len(), 1);
    let eth_frame = EthernetFrame::try_new(&datagrams[0][..]).unwrap();
    assert_eq!(eth_frame.dst_addr(), *context::GATEWAY_ETH);
    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).unwrap();
    assert_eq!(ipv4_packet.dst_addr(), remote);

    assert_matches!(
        context.stack.icmpv4.recv_reply(),
        Some(EchoReply { src_addr, .. }) if src_addr == remote
    );
}

#[test]
fn other_subnet_without_gateway() {
    let context = context::with_peers(vec![]);

    assert_matches!(
        context.stack.icmpv4.ping(Ipv4Address::new([8, 8, 8, 8])),
        Err(Error::MacResolution(addr)) if addr == *context::GATEWAY_IPV4
    );
}

#[test]
fn limited_broadcast_skips_arp() {
    let context = context::with_peers(vec![]);

    context
        .stack
        .ipv4
        .send(Ipv4Address::BROADCAST, ipv4_protocols::ICMP, &[0; 8])
        .unwrap();

    let sent = context.link.sent();
    assert_eq!(sent.len(), 1);
    let eth_frame = EthernetFrame::try_new(&sent[0][..]).unwrap();
    assert!(eth_frame.dst_addr().is_broadcast());
    assert_eq!(eth_frame.payload_type(), eth_types::IPV4);
    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).unwrap();
    assert_eq!(ipv4_packet.dst_addr(), Ipv4Address::BROADCAST);
}

#[test]
fn unknown_eth_type_is_dropped() {
    let context = context::with_gateway();

    let frame = context::ethernet_frame(
        *context::ETHERNET_ADDR,
        *context::GATEWAY_ETH,
        0x86DD,
        &[0; 46],
    );
    assert_matches!(context.link.deliver(frame), None);
    assert!(context.link.sent().is_empty());
}

#[test]
fn frame_for_other_host_is_dropped() {
    let context = context::with_peers(vec![]);

    let frame = context::ethernet_frame(
        EthernetAddress::new([0x52, 0x54, 0x00, 0x12, 0x34, 0x57]),
        *context::GATEWAY_ETH,
        eth_types::IPV4,
        &context::ipv4_datagram(*context::GATEWAY_IPV4, *context::IPV4_ADDR, &[0; 8]),
    );
    assert_matches!(context.link.deliver(frame), None);
}

#[test]
fn dropped_stack_stops_receiving() {
    let context = context::with_peers(vec![]);
    let ethernet = context.stack.ethernet.clone();
    let link = context.link.clone();
    drop(context);

    // Only the Ethernet layer is still alive, with nobody registered on it.
    let mut frame = context::ethernet_frame(
        *context::ETHERNET_ADDR,
        *context::GATEWAY_ETH,
        eth_types::IPV4,
        &context::ipv4_datagram(*context::GATEWAY_IPV4, *context::IPV4_ADDR, &[0; 8]),
    );
    assert_eq!(ethernet.recv_frame(&mut frame[..]), Received::Dropped);
    assert!(link.sent().is_empty());
}
