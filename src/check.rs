use byteorder::{
    ByteOrder,
    NetworkEndian,
};

/// Calculates the Internet Checksum from [RFC1071](https://tools.ietf.org/html/rfc1071).
///
/// Words are read in network byte order and a trailing odd byte is treated as
/// the high byte of a final word. The result is meant to be written back in
/// network byte order, after which summing the same buffer yields zero.
///
/// See [IPv4 header checksum](https://en.wikipedia.org/wiki/IPv4_header_checksum) for an example.
pub fn internet_checksum(buffer: &[u8]) -> u16 {
    let mut acc = 0 as u32;

    for word in buffer.chunks(2) {
        acc += match word.len() {
            2 => NetworkEndian::read_u16(word) as u32,
            _ => (word[0] as u32) << 8,
        };
    }

    while acc & 0xFFFF_0000 != 0 {
        acc = (acc & 0xFFFF) + (acc >> 16);
    }

    !acc as u16
}
