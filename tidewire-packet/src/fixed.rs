//! Non-owning packets
//!
//! A [`FixedPacket`] never allocates or frees memory. Its payload lives in a
//! buffer supplied by the caller (a static array, a pool slot, a DMA
//! region...), which the borrow checker guarantees outlives the packet.

use crate::packet::sealed::RawHeader;
use crate::packet::{Header, PacketBase};

/// Packet over a borrowed buffer
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedPacket<'a> {
    header: Header,
    buffer: Option<&'a mut [u8]>,
}

impl<'a> FixedPacket<'a> {
    /// Create a packet in the reset state with no buffer
    pub const fn new() -> Self {
        Self {
            header: Header::new(0, crate::kind::PacketType::None),
            buffer: None,
        }
    }

    /// Create a packet in the reset state over `buffer`
    pub fn with_buffer(buffer: &'a mut [u8]) -> Self {
        let mut packet = Self::new();
        packet.attach(buffer);
        packet
    }

    /// Create a packet carrying the fields of `header` but no buffer
    ///
    /// This is how a packet's fields are copied without sharing its buffer.
    /// The payload length is zero until a buffer is attached and filled.
    pub fn with_header(header: Header) -> Self {
        Self {
            header: header.without_payload(),
            buffer: None,
        }
    }

    /// Replace the buffer view
    ///
    /// The previous view is handed back untouched. The payload length is
    /// clamped to the new capacity.
    pub fn attach(&mut self, buffer: &'a mut [u8]) -> Option<&'a mut [u8]> {
        let previous = self.buffer.replace(buffer);
        let capacity = self.capacity();
        if self.payload_len() > capacity {
            self.header.payload_len = capacity as u16;
        }
        previous
    }

    /// Remove the buffer view, leaving the packet with no payload
    pub fn detach(&mut self) -> Option<&'a mut [u8]> {
        self.header.payload_len = 0;
        self.buffer.take()
    }

    /// Split into header fields and the buffer view
    pub fn into_parts(self) -> (Header, Option<&'a mut [u8]>) {
        (self.header, self.buffer)
    }
}

impl RawHeader for FixedPacket<'_> {
    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }
}

impl PacketBase for FixedPacket<'_> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        self.buffer.as_deref_mut()
    }
}
