use core::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use core::str::FromStr;

use byteorder::{
    ByteOrder,
    NetworkEndian,
};

use crate::check::internet_checksum;
use crate::{
    Error,
    Result,
};

/// [IPv4 address](https://en.wikipedia.org/wiki/IPv4) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 4]);

impl Address {
    pub const BROADCAST: Address = Address([0xFF; 4]);

    pub const UNSPECIFIED: Address = Address([0; 4]);

    /// Creates an IPv4 address from a network byte order buffer.
    pub const fn new(addr: [u8; 4]) -> Address {
        Address(addr)
    }

    /// Tries to create an IPv4 address from a network byte order slice.
    pub fn try_new(addr: &[u8]) -> Result<Address> {
        if addr.len() != 4 {
            return Err(Error::Exhausted);
        }

        let mut _addr: [u8; 4] = [0; 4];
        _addr.copy_from_slice(addr);
        Ok(Address(_addr))
    }

    /// Returns a reference to the network byte order representation of the
    /// address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Applies a subnet mask, leaving only the network prefix.
    pub fn mask(&self, mask: Address) -> Address {
        let mut addr = self.0;
        for (byte, mask) in addr.iter_mut().zip(mask.0.iter()) {
            *byte &= *mask;
        }
        Address(addr)
    }

    /// Checks if both addresses share the network prefix selected by mask.
    pub fn is_same_subnet(&self, other: Address, mask: Address) -> bool {
        self.mask(mask) == other.mask(mask)
    }

    /// Checks if this is the limited broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Returns the address as a single integer in host byte order, e.g. for
    /// printing in hex.
    pub fn to_u32(&self) -> u32 {
        NetworkEndian::read_u32(&self.0)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Address {
    type Err = ();

    /// Parses an IPv4 address from an A.B.C.D style string.
    fn from_str(addr: &str) -> core::result::Result<Address, Self::Err> {
        let mut ipv4: [u8; 4] = [0; 4];
        let mut tokens = addr.split('.');

        for byte in ipv4.iter_mut() {
            let token = tokens.next().ok_or(())?;
            *byte = token.parse::<u8>().map_err(|_| ())?;
        }

        if tokens.next().is_some() {
            return Err(());
        }

        Ok(Address::new(ipv4))
    }
}

/// [https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers](https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers)
pub mod protocols {
    pub const ICMP: u8 = 0x01;
}

pub mod flags {
    pub const DONT_FRAGMENT: u16 = 0x4000;

    pub const MORE_FRAGMENTS: u16 = 0x2000;
}

mod fields {
    use core::ops::Range;

    pub const VERSION_AND_HEADER_LEN: usize = 0;

    pub const TYPE_OF_SERVICE: usize = 1;

    pub const PACKET_LEN: Range<usize> = 2 .. 4;

    pub const IDENTIFICATION: Range<usize> = 4 .. 6;

    pub const FLAGS_AND_FRAGMENT_OFFSET: Range<usize> = 6 .. 8;

    pub const TTL: usize = 8;

    pub const PROTOCOL: usize = 9;

    pub const CHECKSUM: Range<usize> = 10 .. 12;

    pub const SRC_ADDR: Range<usize> = 12 .. 16;

    pub const DST_ADDR: Range<usize> = 16 .. 20;
}

/// View of a byte buffer as an IPv4 packet.
///
/// The buffer may be longer than the packet, e.g. when a short packet was
/// padded to the minimum Ethernet frame size. Use `payload()` to see only the
/// bytes covered by the packet length field.
#[derive(Debug)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub const HEADER_LEN: usize = 20;

    pub const MAX_PACKET_LEN: usize = 65535;

    /// Tries to create an IPv4 packet view over a byte buffer.
    ///
    /// Fails if the buffer cannot hold the header, or if the header and
    /// packet lengths disagree with each other or with the buffer.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        let buffer_len = buffer.as_ref().len();

        if buffer_len < Self::HEADER_LEN {
            return Err(Error::Exhausted);
        }

        let packet = Packet { buffer };
        let header_len = packet.header_len() as usize;
        let packet_len = packet.packet_len() as usize;

        if packet.ip_version() != 4 || header_len < Self::HEADER_LEN || header_len > packet_len
            || packet_len > buffer_len
        {
            return Err(Error::Malformed);
        }

        Ok(packet)
    }

    /// Returns the length of an IPv4 packet with no options and the specified
    /// payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::HEADER_LEN + payload_len
    }

    /// Checks if the header checksum is valid.
    pub fn check_encoding(&self) -> Result<()> {
        if self.gen_header_checksum() != 0 {
            Err(Error::Checksum)
        } else {
            Ok(())
        }
    }

    /// Calculates the checksum over the header, options included.
    pub fn gen_header_checksum(&self) -> u16 {
        internet_checksum(&self.buffer.as_ref()[.. self.header_len() as usize])
    }

    pub fn ip_version(&self) -> u8 {
        self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] >> 4
    }

    /// Returns the header length in bytes.
    pub fn header_len(&self) -> u8 {
        (self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] & 0x0F) * 4
    }

    pub fn type_of_service(&self) -> u8 {
        self.buffer.as_ref()[fields::TYPE_OF_SERVICE]
    }

    pub fn packet_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::PACKET_LEN])
    }

    pub fn identification(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::IDENTIFICATION])
    }

    pub fn flags_and_fragment_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::FLAGS_AND_FRAGMENT_OFFSET])
    }

    pub fn ttl(&self) -> u8 {
        self.buffer.as_ref()[fields::TTL]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer.as_ref()[fields::PROTOCOL]
    }

    pub fn header_checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::CHECKSUM])
    }

    pub fn src_addr(&self) -> Address {
        let mut addr = [0; 4];
        addr.copy_from_slice(&self.buffer.as_ref()[fields::SRC_ADDR]);
        Address(addr)
    }

    pub fn dst_addr(&self) -> Address {
        let mut addr = [0; 4];
        addr.copy_from_slice(&self.buffer.as_ref()[fields::DST_ADDR]);
        Address(addr)
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[self.header_len() as usize .. self.packet_len() as usize]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_ttl(&mut self, ttl: u8) {
        self.buffer.as_mut()[fields::TTL] = ttl;
    }

    pub fn set_header_checksum(&mut self, checksum: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[fields::CHECKSUM], checksum);
    }

    pub fn set_src_addr(&mut self, addr: Address) {
        self.buffer.as_mut()[fields::SRC_ADDR].copy_from_slice(addr.as_bytes());
    }

    pub fn set_dst_addr(&mut self, addr: Address) {
        self.buffer.as_mut()[fields::DST_ADDR].copy_from_slice(addr.as_bytes());
    }

    /// Zeroes the checksum field and recomputes it over the header.
    pub fn fill_checksum(&mut self) {
        self.set_header_checksum(0);
        let checksum = self.gen_header_checksum();
        self.set_header_checksum(checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        let packet_len = self.packet_len() as usize;
        &mut self.buffer.as_mut()[header_len .. packet_len]
    }
}

/// An IPv4 header without options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub protocol: u8,
    pub payload_len: u16,
}

impl Repr {
    pub const DEFAULT_TTL: u8 = 64;

    pub const IDENTIFICATION: u16 = 0x0001;

    /// Returns the size of the packet, header included.
    pub fn buffer_len(&self) -> usize {
        Packet::<&[u8]>::buffer_len(self.payload_len as usize)
    }

    /// Serializes the header into the start of a buffer, checksum included.
    ///
    /// The payload is left untouched, so it may be written before or after.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<()> {
        let packet_len = self.buffer_len();
        if packet_len > Packet::<&[u8]>::MAX_PACKET_LEN || buffer.len() < packet_len {
            return Err(Error::Exhausted);
        }

        buffer[fields::VERSION_AND_HEADER_LEN] = 0x45;
        buffer[fields::TYPE_OF_SERVICE] = 0;
        NetworkEndian::write_u16(&mut buffer[fields::PACKET_LEN], packet_len as u16);
        NetworkEndian::write_u16(&mut buffer[fields::IDENTIFICATION], Self::IDENTIFICATION);
        NetworkEndian::write_u16(
            &mut buffer[fields::FLAGS_AND_FRAGMENT_OFFSET],
            flags::DONT_FRAGMENT,
        );
        buffer[fields::TTL] = Self::DEFAULT_TTL;
        buffer[fields::PROTOCOL] = self.protocol;

        let mut packet = Packet { buffer };
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
        packet.fill_checksum();

        Ok(())
    }
}
