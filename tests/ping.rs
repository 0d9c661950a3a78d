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
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
};
use dracnet::service::{
    EchoReply,
    Icmpv4Service,
};
use dracnet::{
    shell,
    Error,
};

use crate::context::Peer;

fn echo_request_frame(dst_addr: Ipv4Address, payload: &[u8]) -> Vec<u8> {
    context::ethernet_frame(
        *context::ETHERNET_ADDR,
        *context::GATEWAY_ETH,
        eth_types::IPV4,
        &context::ipv4_datagram(
            *context::GATEWAY_IPV4,
            dst_addr,
            &context::icmp_message(Icmpv4Repr::EchoRequest { id: 0xBEEF, seq: 9 }, payload),
        ),
    )
}

#[test]
fn ping_default_gateway() {
    let context = context::with_gateway();

    assert_eq!(context.stack.icmpv4.ping(*context::GATEWAY_IPV4).unwrap(), 1);
    assert_eq!(
        context.stack.icmpv4.recv_reply(),
        Some(EchoReply {
            src_addr: *context::GATEWAY_IPV4,
            id: Icmpv4Service::PING_IDENT,
            seq: 1,
        })
    );
    assert_matches!(context.stack.icmpv4.recv_reply(), None);

    let sent = context.link.sent_with_type(eth_types::IPV4);
    assert_eq!(sent.len(), 1);
    let eth_frame = EthernetFrame::try_new(&sent[0][..]).unwrap();
    assert_eq!(eth_frame.dst_addr(), *context::GATEWAY_ETH);

    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).unwrap();
    assert_matches!(ipv4_packet.check_encoding(), Ok(()));
    assert_eq!(ipv4_packet.protocol(), ipv4_protocols::ICMP);
    assert_eq!(ipv4_packet.src_addr(), *context::IPV4_ADDR);
    assert_eq!(ipv4_packet.dst_addr(), *context::GATEWAY_IPV4);

    let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload()).unwrap();
    assert_matches!(icmp_packet.check_encoding(), Ok(()));
    assert_eq!(
        Icmpv4Repr::deserialize(&icmp_packet).unwrap(),
        Icmpv4Repr::EchoRequest { id: 0x1337, seq: 1 }
    );
}

#[test]
fn ping_sequence_numbers_increase() {
    let context = context::with_gateway();

    for seq in 1 .. 4 {
        assert_eq!(
            context.stack.icmpv4.ping(*context::GATEWAY_IPV4).unwrap(),
            seq
        );
    }

    let seqs: Vec<u16> = std::iter::from_fn(|| context.stack.icmpv4.recv_reply())
        .map(|reply| reply.seq)
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    // Only the first ping had to resolve the gateway.
    assert_eq!(context.link.sent_with_type(eth_types::ARP).len(), 1);
}

#[test]
fn ping_unknown_ip() {
    let context = context::with_gateway();

    assert_matches!(
        context.stack.icmpv4.ping(Ipv4Address::new([10, 0, 2, 128])),
        Err(Error::MacResolution(_))
    );
    assert!(context.link.sent_with_type(eth_types::IPV4).is_empty());
    assert_matches!(context.stack.icmpv4.recv_reply(), None);
}

#[test]
fn ping_unresponsive_peer() {
    let mut gateway = Peer::gateway();
    gateway.answers_ping = false;
    let context = context::with_peers(vec![gateway]);

    assert_eq!(context.stack.icmpv4.ping(*context::GATEWAY_IPV4).unwrap(), 1);
    assert_eq!(context.link.sent_with_type(eth_types::IPV4).len(), 1);
    assert_matches!(context.stack.icmpv4.recv_reply(), None);
}

#[test]
fn echo_request_is_answered() {
    let context = context::with_peers(vec![]);

    let reply = context
        .link
        .deliver(echo_request_frame(*context::IPV4_ADDR, b"0123456789"))
        .unwrap();

    let eth_frame = EthernetFrame::try_new(&reply[..]).unwrap();
    assert_eq!(eth_frame.dst_addr(), *context::GATEWAY_ETH);
    assert_eq!(eth_frame.src_addr(), *context::ETHERNET_ADDR);
    assert_eq!(eth_frame.payload_type(), eth_types::IPV4);

    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).unwrap();
    assert_matches!(ipv4_packet.check_encoding(), Ok(()));
    assert_eq!(ipv4_packet.src_addr(), *context::IPV4_ADDR);
    assert_eq!(ipv4_packet.dst_addr(), *context::GATEWAY_IPV4);
    assert_eq!(ipv4_packet.ttl(), 64);

    let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload()).unwrap();
    assert_eq!(icmp_packet._type(), 0);
    assert_eq!(icmp_packet.gen_packet_checksum(), 0);
    assert_eq!(
        Icmpv4Repr::deserialize(&icmp_packet).unwrap(),
        Icmpv4Repr::EchoReply { id: 0xBEEF, seq: 9 }
    );
    assert_eq!(icmp_packet.payload(), b"0123456789");
}

#[test]
fn echo_request_with_link_padding_is_answered() {
    let context = context::with_peers(vec![]);

    // Short frames are padded by the link to 60 bytes.
    let mut frame = echo_request_frame(*context::IPV4_ADDR, &[]);
    frame.resize(60, 0);

    let reply = context.link.deliver(frame).unwrap();
    assert_eq!(reply.len(), 60);

    let eth_frame = EthernetFrame::try_new(&reply[..]).unwrap();
    let ipv4_packet = Ipv4Packet::try_new(eth_frame.payload()).unwrap();
    assert_eq!(ipv4_packet.packet_len(), 28);
    let icmp_packet = Icmpv4Packet::try_new(ipv4_packet.payload()).unwrap();
    assert_matches!(icmp_packet.check_encoding(), Ok(()));
}

#[test]
fn echo_request_for_other_ip_is_dropped() {
    let context = context::with_peers(vec![]);

    assert_matches!(
        context
            .link
            .deliver(echo_request_frame(Ipv4Address::new([10, 0, 2, 16]), &[])),
        None
    );
    assert!(context.link.sent().is_empty());
    assert_matches!(context.stack.icmpv4.recv_reply(), None);
}

#[test]
fn echo_request_with_bad_checksum_is_dropped() {
    let context = context::with_peers(vec![]);

    let mut frame = echo_request_frame(*context::IPV4_ADDR, &[]);
    // Corrupt the ICMP checksum, leaving the IPv4 header intact.
    frame[14 + 20 + 2] ^= 0x01;

    assert_matches!(context.link.deliver(frame), None);
    assert!(context.link.sent().is_empty());
}

#[test]
fn shell_ping_command() {
    let context = context::with_gateway();
    let mut out = String::new();

    shell::ping(&context.stack.icmpv4, "10.0.2.2 -v", &mut out).unwrap();

    assert_eq!(out, "Pinging 10.0.2.2...\nSent echo request with seq 1.\n");
    assert_matches!(
        context.stack.icmpv4.recv_reply(),
        Some(EchoReply { seq: 1, .. })
    );
}

#[test]
fn shell_ping_hex() {
    let context = context::with_gateway();
    let mut out = String::new();

    shell::ping(&context.stack.icmpv4, "-hex 10.0.2.2", &mut out).unwrap();

    assert_eq!(out, "Pinging 0x0A000202...\n");
}

#[test]
fn shell_ping_usage() {
    let context = context::with_gateway();

    let mut out = String::new();
    shell::ping(&context.stack.icmpv4, "", &mut out).unwrap();
    assert_eq!(out, format!("{}\n", shell::PING_USAGE));

    let mut out = String::new();
    shell::ping(&context.stack.icmpv4, "10.0.2.2 -h", &mut out).unwrap();
    assert!(out.starts_with(shell::PING_USAGE));
    assert!(out.contains("-hex"));

    let mut out = String::new();
    shell::ping(&context.stack.icmpv4, "10.0.2", &mut out).unwrap();
    assert_eq!(out, "ping: invalid IPv4 address \"10.0.2\"\n");

    assert!(context.link.sent().is_empty());
}

#[test]
fn shell_ping_debug() {
    let context = context::with_gateway();
    let mut out = String::new();

    shell::ping(&context.stack.icmpv4, "10.0.2.2 -d", &mut out).unwrap();

    assert!(out.starts_with("DEBUG MODE: argv[0]: \"ping\"\n"));
    assert!(out.contains("DEBUG MODE: argv[1]: \"10.0.2.2\"\n"));
    assert!(out.contains("DEBUG MODE: argv[2]: \"-d\"\n"));
    assert!(out.contains("DEBUG MODE: Target IP: 0x0A000202 = 167772674\n"));
    assert!(out.ends_with("Pinging 10.0.2.2...\n"));
}
