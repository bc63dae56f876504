//! Frame encoding for the serial wire format.
//!
//! Frame format:
//! - START FLAG (3 bytes): `0x7C 0x7C 0x7C`
//! - IUID (2 bytes): interface unique identifier, big-endian
//! - TYPE (1 byte): packet type tag
//! - LENGTH (1 byte): payload length (0-255)
//! - PAYLOAD (0-255 bytes): opaque application data
//! - CRC (2 bytes): checksum over PAYLOAD only, big-endian
//!
//! A receiver treats any run of three or more `0x7C` bytes as the start
//! flag, so the IUID high byte can never be `0x7C`. Such identifiers are
//! reserved and refused by [`encode`].

use core::fmt;

use crate::error::PacketError;
use crate::packet::Header;

/// Frame synchronization byte
pub const START_BYTE: u8 = 0x7C;

/// Frame start flag
pub const START_FLAG: [u8; 3] = [START_BYTE; 3];

/// Bytes before the payload (START FLAG + IUID + TYPE + LENGTH)
pub const HEADER_LEN: usize = START_FLAG.len() + 2 + 1 + 1;

/// Bytes after the payload
pub const CRC_LEN: usize = 2;

/// Maximum payload size in bytes (LENGTH is a single byte)
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = HEADER_LEN + MAX_PAYLOAD_SIZE + CRC_LEN;

/// Errors that can occur during frame encoding or parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds what the LENGTH byte (or the configured limit) allows
    PayloadTooLarge,
    /// IUID high byte is the start flag byte
    ReservedIuid(u16),
    /// Output buffer too small for encoding
    BufferTooSmall,
    /// CRC on the wire does not match the received payload
    IntegrityMismatch {
        /// CRC carried by the frame
        received: u16,
        /// CRC computed over the received payload
        computed: u16,
    },
    /// The destination packet could not take the payload
    Packet(PacketError),
}

impl From<PacketError> for FrameError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::IntegrityMismatch { received, computed } => {
                FrameError::IntegrityMismatch { received, computed }
            }
            other => FrameError::Packet(other),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLarge => f.write_str("payload too large for frame"),
            FrameError::ReservedIuid(iuid) => write!(f, "iuid {iuid:#06x} is reserved"),
            FrameError::BufferTooSmall => f.write_str("buffer too small for frame"),
            FrameError::IntegrityMismatch { received, computed } => {
                write!(f, "crc mismatch: received {received:#06x}, computed {computed:#06x}")
            }
            FrameError::Packet(err) => write!(f, "packet error: {err}"),
        }
    }
}

impl core::error::Error for FrameError {}

/// Check if `iuid` can be sent: its high byte must differ from [`START_BYTE`]
pub const fn is_valid_iuid(iuid: u16) -> bool {
    (iuid >> 8) as u8 != START_BYTE
}

/// Size of a frame carrying `payload_len` bytes
pub const fn frame_len(payload_len: usize) -> usize {
    HEADER_LEN + payload_len + CRC_LEN
}

/// Encode a frame into `buffer`
///
/// The CRC is taken from `header` as is. Returns the number of bytes written.
pub fn encode(header: &Header, payload: &[u8], buffer: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge);
    }
    if !is_valid_iuid(header.iuid) {
        return Err(FrameError::ReservedIuid(header.iuid));
    }
    let len = frame_len(payload.len());
    if buffer.len() < len {
        return Err(FrameError::BufferTooSmall);
    }

    let crc_at = HEADER_LEN + payload.len();
    buffer[..3].copy_from_slice(&START_FLAG);
    buffer[3..5].copy_from_slice(&header.iuid.to_be_bytes());
    buffer[5] = header.packet_type.to_byte();
    buffer[6] = payload.len() as u8;
    buffer[HEADER_LEN..crc_at].copy_from_slice(payload);
    buffer[crc_at..len].copy_from_slice(&header.crc.to_be_bytes());

    Ok(len)
}
