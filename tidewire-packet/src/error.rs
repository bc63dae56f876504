//! Packet errors

use core::fmt;

/// Errors raised by packet storage and payload operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Storage of the requested size could not be allocated
    ///
    /// The packet is left without a buffer.
    AllocationFailure {
        /// Requested capacity in bytes
        requested: usize,
    },
    /// No buffer is attached to the packet
    UnsetBuffer,
    /// The attached buffer cannot hold the payload
    BufferTooSmall {
        /// Bytes needed
        required: usize,
        /// Bytes available
        capacity: usize,
    },
    /// Payload is not valid UTF-8
    InvalidText,
    /// Stored CRC does not match the payload
    IntegrityMismatch {
        /// CRC carried by the packet
        received: u16,
        /// CRC computed over the payload
        computed: u16,
    },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::AllocationFailure { requested } => {
                write!(f, "failed to allocate {requested} byte payload buffer")
            }
            PacketError::UnsetBuffer => f.write_str("no buffer has been set or allocated"),
            PacketError::BufferTooSmall { required, capacity } => {
                write!(f, "payload of {required} bytes exceeds buffer of {capacity} bytes")
            }
            PacketError::InvalidText => f.write_str("payload is not valid UTF-8"),
            PacketError::IntegrityMismatch { received, computed } => {
                write!(f, "crc mismatch: received {received:#06x}, computed {computed:#06x}")
            }
        }
    }
}

impl core::error::Error for PacketError {}
