//! Packet header and shared packet operations
//!
//! [`PacketBase`] holds everything the packet variants have in common: the
//! header fields, the payload view, checksumming and encoding. A variant only
//! has to say where its header lives and which buffer (if any) is attached.

#[cfg(feature = "alloc")]
use alloc::string::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::crc::{Checksum, Crc16, CRC_RESET};
use crate::error::PacketError;
use crate::frame::{self, FrameError, MAX_FRAME_SIZE};
use crate::kind::PacketType;

/// Largest buffer a packet tracks; payload lengths are 16-bit in memory
pub const MAX_BUFFER_SIZE: usize = u16::MAX as usize;

/// Scalar packet fields
///
/// The payload length can only be changed through a packet, which keeps it
/// within the attached buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// Interface unique identifier
    pub iuid: u16,
    /// Packet purpose
    pub packet_type: PacketType,
    /// Payload checksum
    pub crc: u16,
    /// Payload length in bytes
    pub(crate) payload_len: u16,
}

impl Default for Header {
    fn default() -> Self {
        Self::new(0, PacketType::None)
    }
}

impl Header {
    /// Create a header with an empty payload and an unset CRC
    pub const fn new(iuid: u16, packet_type: PacketType) -> Self {
        Self {
            iuid,
            packet_type,
            crc: CRC_RESET,
            payload_len: 0,
        }
    }

    /// Payload length in bytes
    pub const fn payload_len(&self) -> u16 {
        self.payload_len
    }

    /// Clear the logical state, keeping the interface identifier
    pub fn reset(&mut self) {
        self.packet_type = PacketType::None;
        self.payload_len = 0;
        self.crc = CRC_RESET;
    }

    /// Copy of this header describing a packet with no payload
    pub(crate) fn without_payload(mut self) -> Self {
        self.payload_len = 0;
        self
    }
}

pub(crate) mod sealed {
    use super::Header;

    /// Raw header access, kept inside the crate so the payload length can
    /// only change through methods that check it against the buffer
    pub trait RawHeader {
        fn header_mut(&mut self) -> &mut Header;
    }
}

use sealed::RawHeader;

/// Operations shared by every packet variant
///
/// Implementors provide access to the header and to the attached buffer;
/// the buffer is the full backing storage, of which the first
/// `payload_len` bytes are the payload. The trait is sealed: only the
/// packet types of this crate implement it.
///
/// A whole [`Header`] cannot be written through a packet:
///
/// ```compile_fail
/// use tidewire_packet::{FixedPacket, Header, PacketBase};
///
/// let mut packet = FixedPacket::new();
/// *packet.header_mut() = Header::default();
/// ```
pub trait PacketBase: RawHeader {
    /// Header fields
    fn header(&self) -> &Header;

    /// Attached backing storage, if any
    fn buffer(&self) -> Option<&[u8]>;

    /// Mutable backing storage, if any
    fn buffer_mut(&mut self) -> Option<&mut [u8]>;

    /// Make room for a payload of `len` bytes
    ///
    /// Called by the parser before payload bytes are written. The default
    /// only checks the attached buffer; variants that can allocate override
    /// it to grow their storage.
    fn prepare_payload(&mut self, len: usize) -> Result<(), PacketError> {
        if self.buffer().is_none() {
            return Err(PacketError::UnsetBuffer);
        }
        let capacity = self.capacity();
        if len > capacity {
            return Err(PacketError::BufferTooSmall {
                required: len,
                capacity,
            });
        }
        Ok(())
    }

    /// Capacity of the attached buffer (0 without one)
    fn capacity(&self) -> usize {
        self.buffer().map_or(0, |b| b.len().min(MAX_BUFFER_SIZE))
    }

    /// Check if a buffer is attached
    fn has_buffer(&self) -> bool {
        self.buffer().is_some()
    }

    /// Interface unique identifier
    fn iuid(&self) -> u16 {
        self.header().iuid
    }

    /// Set the interface unique identifier
    fn set_iuid(&mut self, iuid: u16) {
        self.header_mut().iuid = iuid;
    }

    /// Packet type
    fn packet_type(&self) -> PacketType {
        self.header().packet_type
    }

    /// Set the packet type
    ///
    /// Accepts anything convertible to a [`PacketType`]; raw tags outside
    /// the known set are stored as `Unrecognized` rather than rejected.
    fn set_type<T: Into<PacketType>>(&mut self, value: T) {
        self.header_mut().packet_type = value.into();
    }

    /// Stored CRC value
    fn crc(&self) -> u16 {
        self.header().crc
    }

    /// Overwrite the stored CRC, e.g. with the value received on the wire
    fn set_crc(&mut self, crc: u16) {
        self.header_mut().crc = crc;
    }

    /// Payload length in bytes
    fn payload_len(&self) -> usize {
        self.header().payload_len as usize
    }

    /// Copy the iuid, type and CRC of `header`
    ///
    /// The payload length is not copied; it stays within this packet's
    /// buffer.
    fn set_header(&mut self, header: &Header) {
        let fields = self.header_mut();
        fields.iuid = header.iuid;
        fields.packet_type = header.packet_type;
        fields.crc = header.crc;
    }

    /// Reset type, payload length and CRC
    ///
    /// The buffer and its ownership are left alone so one allocation can be
    /// reused for many packets.
    fn reset(&mut self) {
        self.header_mut().reset();
    }

    /// Payload bytes (empty without a buffer)
    fn payload(&self) -> &[u8] {
        let len = self.payload_len();
        self.buffer()
            .and_then(|b| b.get(..len))
            .unwrap_or_default()
    }

    /// Mutable payload bytes (empty without a buffer)
    fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.payload_len();
        self.buffer_mut()
            .and_then(|b| b.get_mut(..len))
            .unwrap_or_default()
    }

    /// Set the payload length after writing through [`buffer_mut`](Self::buffer_mut)
    fn set_payload_len(&mut self, len: usize) -> Result<(), PacketError> {
        if self.buffer().is_none() {
            return Err(PacketError::UnsetBuffer);
        }
        let capacity = self.capacity();
        if len > capacity {
            return Err(PacketError::BufferTooSmall {
                required: len,
                capacity,
            });
        }
        // capacity never exceeds MAX_BUFFER_SIZE
        self.header_mut().payload_len = len as u16;
        Ok(())
    }

    /// Copy `bytes` into the buffer and make them the payload
    ///
    /// Never allocates: the buffer must already be large enough.
    fn set_payload(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        let capacity = self.capacity();
        let buffer = self.buffer_mut().ok_or(PacketError::UnsetBuffer)?;
        if bytes.len() > capacity {
            return Err(PacketError::BufferTooSmall {
                required: bytes.len(),
                capacity,
            });
        }
        buffer[..bytes.len()].copy_from_slice(bytes);
        self.set_payload_len(bytes.len())
    }

    /// Payload as UTF-8 text, without copying
    fn payload_str(&self) -> Result<&str, PacketError> {
        if self.buffer().is_none() {
            return Err(PacketError::UnsetBuffer);
        }
        core::str::from_utf8(self.payload()).map_err(|_| PacketError::InvalidText)
    }

    /// Copy of the payload as text
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected; the only
    /// failure is a packet without a buffer.
    #[cfg(feature = "alloc")]
    fn payload_as_text(&self) -> Result<String, PacketError> {
        let buffer = self.buffer().ok_or(PacketError::UnsetBuffer)?;
        let payload = buffer.get(..self.payload_len()).unwrap_or_default();
        Ok(String::from_utf8_lossy(payload).into_owned())
    }

    /// Checksum of the current payload, without storing it
    fn checksum_with<C: Checksum>(&self, checksum: &C) -> u16 {
        checksum.checksum(self.payload())
    }

    /// Compute, store and return the payload CRC using [`Crc16`]
    fn compute_crc(&mut self) -> u16 {
        self.compute_crc_with(&Crc16::default())
    }

    /// Compute, store and return the payload CRC using `checksum`
    fn compute_crc_with<C: Checksum>(&mut self, checksum: &C) -> u16 {
        let crc = self.checksum_with(checksum);
        self.header_mut().crc = crc;
        crc
    }

    /// Check the stored CRC against the payload using [`Crc16`]
    fn verify_crc(&self) -> Result<(), PacketError> {
        self.verify_crc_with(&Crc16::default())
    }

    /// Check the stored CRC against the payload using `checksum`
    fn verify_crc_with<C: Checksum>(&self, checksum: &C) -> Result<(), PacketError> {
        let computed = self.checksum_with(checksum);
        let received = self.crc();
        if computed != received {
            return Err(PacketError::IntegrityMismatch { received, computed });
        }
        Ok(())
    }

    /// Size of this packet on the wire
    fn frame_len(&self) -> usize {
        frame::frame_len(self.payload_len())
    }

    /// Encode this packet as a frame into `out`
    ///
    /// The stored CRC is written as is; call [`compute_crc`](Self::compute_crc)
    /// first. Returns the number of bytes written.
    fn encode(&self, out: &mut [u8]) -> Result<usize, FrameError> {
        frame::encode(self.header(), self.payload(), out)
    }

    /// Encode this packet into a heapless Vec
    fn encode_to_vec(&self) -> Result<heapless::Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = heapless::Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}
