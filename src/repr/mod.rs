//! Serialization and deserialization of network packets.
//!
//! The `repr` module provides views over byte buffers and plain
//! representations for frames and packets at each layer of the stack. All
//! multi-byte fields are stored in network byte order.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;

pub use self::arp::{
    hw_types as arp_hw_types,
    proto_types as arp_proto_types,
    Arp,
    Op as ArpOp,
};
pub use self::ethernet::{
    eth_types,
    Address as EthernetAddress,
    Frame as EthernetFrame,
};
pub use self::icmpv4::{
    Packet as Icmpv4Packet,
    Repr as Icmpv4Repr,
};
pub use self::ipv4::{
    flags as ipv4_flags,
    protocols as ipv4_protocols,
    Address as Ipv4Address,
    Packet as Ipv4Packet,
    Repr as Ipv4Repr,
};
