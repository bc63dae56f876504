//! Packet type tags
//!
//! The TYPE byte of a frame says what the packet is for. Unknown tags are
//! kept as [`PacketType::Unrecognized`] so that newer peers can introduce
//! packet types without older ones rejecting the frame.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Wire tags
pub const TAG_NONE: u8 = 0x00;
pub const TAG_ACK: u8 = b'a';
pub const TAG_NACK: u8 = b'n';
pub const TAG_DATA: u8 = b'd';
pub const TAG_STREAM: u8 = b's';
pub const TAG_ID_REQUEST: u8 = b'i';
pub const TAG_ID_RESPONSE: u8 = b'I';

/// Packet purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PacketType {
    /// No type assigned (reset state)
    #[default]
    None,
    /// Positive acknowledgement
    Ack,
    /// Negative acknowledgement
    Nack,
    /// Single data packet
    Data,
    /// Part of a data stream
    Stream,
    /// Request for the peer's identifier
    IdRequest,
    /// Response carrying the peer's identifier
    IdResponse,
    /// Tag not known to this implementation, carried through untouched
    Unrecognized(u8),
}

impl PacketType {
    /// Get the wire tag for this type
    pub const fn to_byte(self) -> u8 {
        match self {
            PacketType::None => TAG_NONE,
            PacketType::Ack => TAG_ACK,
            PacketType::Nack => TAG_NACK,
            PacketType::Data => TAG_DATA,
            PacketType::Stream => TAG_STREAM,
            PacketType::IdRequest => TAG_ID_REQUEST,
            PacketType::IdResponse => TAG_ID_RESPONSE,
            PacketType::Unrecognized(raw) => raw,
        }
    }

    /// Interpret a wire tag
    ///
    /// Never fails: tags outside the known set become `Unrecognized`.
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            TAG_NONE => PacketType::None,
            TAG_ACK => PacketType::Ack,
            TAG_NACK => PacketType::Nack,
            TAG_DATA => PacketType::Data,
            TAG_STREAM => PacketType::Stream,
            TAG_ID_REQUEST => PacketType::IdRequest,
            TAG_ID_RESPONSE => PacketType::IdResponse,
            raw => PacketType::Unrecognized(raw),
        }
    }

    /// Check if this is one of the known packet types
    pub const fn is_known(self) -> bool {
        !matches!(self, PacketType::Unrecognized(_))
    }
}

impl From<u8> for PacketType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags() {
        assert_eq!(PacketType::from(b'a'), PacketType::Ack);
        assert_eq!(PacketType::from(b'n'), PacketType::Nack);
        assert_eq!(PacketType::from(b'd'), PacketType::Data);
        assert_eq!(PacketType::from(b's'), PacketType::Stream);
        assert_eq!(PacketType::from(b'i'), PacketType::IdRequest);
        assert_eq!(PacketType::from(b'I'), PacketType::IdResponse);
        assert_eq!(PacketType::from(0u8), PacketType::None);
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let t = PacketType::from(0x42u8);
        assert_eq!(t, PacketType::Unrecognized(0x42));
        assert!(!t.is_known());
        assert_eq!(u8::from(t), 0x42);
    }

    #[test]
    fn test_char_tags_convert_through_u8() {
        let tag = u8::try_from('I').unwrap();
        assert_eq!(PacketType::from(tag), PacketType::IdResponse);
        // Wider code points have no tag instead of wrapping to NONE
        assert!(u8::try_from('\u{100}').is_err());
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(PacketType::default(), PacketType::None);
        assert!(PacketType::None.is_known());
    }
}
