use core::cmp;

use byteorder::{
    ByteOrder,
    NetworkEndian,
};

use crate::check::internet_checksum;
use crate::{
    Error,
    Result,
};

/// Safe representation of an ICMP header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    EchoReply { id: u16, seq: u16 },
    EchoRequest { id: u16, seq: u16 },
}

impl Repr {
    pub const ECHO_REPLY: u8 = 0;

    pub const ECHO_REQUEST: u8 = 8;

    /// Returns the ICMP packet size needed to serialize this ICMP
    /// representation.
    pub fn buffer_len(&self) -> usize {
        Packet::<&[u8]>::HEADER_LEN
    }

    /// Tries to deserialize a packet into an ICMP representation.
    ///
    /// Echo messages are recognized by type alone. A message that ends after
    /// the identifier has sequence number 0.
    pub fn deserialize<T>(packet: &Packet<T>) -> Result<Repr>
    where
        T: AsRef<[u8]>,
    {
        let header = packet.header();
        let id = NetworkEndian::read_u16(&header[0 .. 2]);
        let seq = if header.len() >= 4 {
            NetworkEndian::read_u16(&header[2 .. 4])
        } else {
            0
        };

        match packet._type() {
            Self::ECHO_REPLY => Ok(Repr::EchoReply { id, seq }),
            Self::ECHO_REQUEST => Ok(Repr::EchoRequest { id, seq }),
            _ => Err(Error::Malformed),
        }
    }

    /// Serializes the ICMP representation into a packet and fills in the
    /// checksum, so any payload must be written beforehand.
    pub fn serialize<T>(&self, packet: &mut Packet<T>)
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (type_of, id, seq) = match *self {
            Repr::EchoReply { id, seq } => (Self::ECHO_REPLY, id, seq),
            Repr::EchoRequest { id, seq } => (Self::ECHO_REQUEST, id, seq),
        };

        packet.set_type(type_of);
        packet.set_code(0);
        let header = packet.header_mut();
        NetworkEndian::write_u16(&mut header[0 .. 2], id);
        if header.len() >= 4 {
            NetworkEndian::write_u16(&mut header[2 .. 4], seq);
        }
        packet.fill_checksum();
    }
}

/// [https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol](https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol)
mod fields {
    use core::ops::{
        Range,
        RangeFrom,
    };

    pub const TYPE: usize = 0;

    pub const CODE: usize = 1;

    pub const CHECKSUM: Range<usize> = 2 .. 4;

    pub const HEADER: Range<usize> = 4 .. 8;

    pub const PAYLOAD: RangeFrom<usize> = 8 ..;
}

/// View of a byte buffer as an ICMP packet.
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
    pub const HEADER_LEN: usize = 8;

    /// Type, code, checksum and a 16-bit identifier; shorter messages are
    /// rejected.
    pub const MIN_PACKET_LEN: usize = 6;

    pub const MAX_PACKET_LEN: usize = 65515;

    /// Tries to create an ICMP packet view over a byte buffer.
    ///
    /// Buffers shorter than `HEADER_LEN` are accepted down to `MIN_PACKET_LEN`,
    /// in which case `header()` is truncated and `payload()` is empty.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        if buffer.as_ref().len() < Self::MIN_PACKET_LEN
            || buffer.as_ref().len() > Self::MAX_PACKET_LEN
        {
            Err(Error::Exhausted)
        } else {
            Ok(Packet { buffer })
        }
    }

    /// Returns the length of an ICMP packet with the specified payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::HEADER_LEN + payload_len
    }

    /// Checks if the packet has a valid encoding. This may include checksum, field
    /// consistency, etc. checks.
    pub fn check_encoding(&self) -> Result<()> {
        if self.gen_packet_checksum() != 0 {
            Err(Error::Checksum)
        } else {
            Ok(())
        }
    }

    /// Calculates the packet checksum over the whole message.
    pub fn gen_packet_checksum(&self) -> u16 {
        internet_checksum(self.buffer.as_ref())
    }

    pub fn _type(&self) -> u8 {
        self.buffer.as_ref()[fields::TYPE]
    }

    pub fn code(&self) -> u8 {
        self.buffer.as_ref()[fields::CODE]
    }

    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[fields::CHECKSUM])
    }

    pub fn header(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        let end = cmp::min(fields::HEADER.end, buffer.len());
        &buffer[fields::HEADER.start .. end]
    }

    pub fn payload(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        let start = cmp::min(fields::PAYLOAD.start, buffer.len());
        &buffer[start ..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_type(&mut self, type_of: u8) {
        self.buffer.as_mut()[fields::TYPE] = type_of
    }

    pub fn set_code(&mut self, code: u8) {
        self.buffer.as_mut()[fields::CODE] = code;
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[fields::CHECKSUM], checksum);
    }

    /// Zeroes the checksum field and recomputes it over the whole message.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = self.gen_packet_checksum();
        self.set_checksum(checksum);
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        let buffer = self.buffer.as_mut();
        let end = cmp::min(fields::HEADER.end, buffer.len());
        &mut buffer[fields::HEADER.start .. end]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let buffer = self.buffer.as_mut();
        let start = cmp::min(fields::PAYLOAD.start, buffer.len());
        &mut buffer[start ..]
    }
}
