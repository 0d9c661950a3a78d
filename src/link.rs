use crate::repr::{
    EthernetAddress,
    Ipv4Address,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates the card has no free transmit descriptor.
    Busy,
    /// Indicates the card is not initialized or has been stopped.
    Down,
    /// Indicates a miscellaneous error with a message.
    Unknown(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;

/// A low level interface for sending frames across a link, usually backed by
/// a network card driver.
///
/// Received frames travel the other way: the driver hands them to
/// `EthernetService::recv_frame(...)` and transmits the buffer again when a
/// reply is returned.
pub trait Link: Send + Sync {
    /// Sends a complete Ethernet frame across the link.
    ///
    /// The frame is only borrowed for the duration of the call, so drivers
    /// must copy it into their own transmit buffers.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Returns the hardware address of the card.
    fn ethernet_addr(&self) -> EthernetAddress;

    /// Returns the IPv4 address assigned to the card.
    fn ipv4_addr(&self) -> Ipv4Address;

    /// Returns the largest frame, header included, the card can transmit.
    fn max_transmission_unit(&self) -> usize {
        1518
    }
}
