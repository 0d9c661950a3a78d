//! Ethernet, ARP, IPv4 and ICMP for a freestanding kernel.
//!
//! The crate only needs `alloc`; the hosting kernel supplies a `link::Link`
//! for the network card and feeds received frames into
//! `service::ethernet::EthernetService::recv_frame(...)` from its interrupt
//! handler.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[cfg(test)]
#[macro_use]
extern crate assert_matches;
extern crate byteorder;
#[macro_use]
extern crate log;
extern crate spin;

pub mod arp_cache;
pub mod check;
pub mod link;
pub mod repr;
pub mod service;
pub mod shell;

use crate::repr::Ipv4Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates an error where an IPv4 address could not be resolved to an
    /// Ethernet address.
    MacResolution(Ipv4Address),
    /// Indicates an error where a buffer could not be allocated or is larger
    /// than the link allows.
    Exhausted,
    /// Indicates an error where a packet or frame is malformed.
    Malformed,
    /// Indicates an error where a checksum is invalid.
    Checksum,
    /// Indicates a blocking operation was attempted while dispatching a
    /// received frame, where it could never complete.
    InterruptContext,
    /// Indicates an error reported by the link.
    Link(link::Error),
}

impl From<link::Error> for Error {
    fn from(err: link::Error) -> Self {
        Error::Link(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
