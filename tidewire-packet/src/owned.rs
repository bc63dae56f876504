//! Owning packets
//!
//! A [`Packet`] can allocate its own payload storage, and can also adopt a
//! borrowed buffer like a [`FixedPacket`]. Which of the two it currently
//! holds is encoded in [`Storage`], so owned memory is released exactly once:
//! replacing or dropping the storage frees it, and a borrowed view can never
//! be freed by the packet.
//!
//! Storage is grown on demand and, by default, never shrunk (see
//! [`GrowthPolicy`]), so a single packet can be reused for a stream of
//! payloads of varying sizes without allocating for each one.

use alloc::collections::TryReserveError;
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PacketError;
use crate::fixed::FixedPacket;
use crate::packet::sealed::RawHeader;
use crate::packet::{Header, PacketBase, MAX_BUFFER_SIZE};

/// Capacity strategy for [`Packet::ensure_capacity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GrowthPolicy {
    /// Reallocate only when the buffer is too small
    ///
    /// Fewer allocations, at the cost of keeping the largest buffer seen.
    #[default]
    GrowOnly,
    /// Reallocate whenever the capacity differs from the target
    GrowOrShrink,
}

impl GrowthPolicy {
    /// Check if going from `current` to `target` bytes needs a new buffer
    pub fn needs_reallocation(self, current: usize, target: usize) -> bool {
        match self {
            GrowthPolicy::GrowOnly => current < target,
            GrowthPolicy::GrowOrShrink => current != target,
        }
    }
}

/// Payload storage of a [`Packet`]
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Storage<'a> {
    /// No buffer attached
    #[default]
    Empty,
    /// Buffer owned by someone else
    Borrowed(&'a mut [u8]),
    /// Buffer owned by the packet
    Owned(Vec<u8>),
}

impl Storage<'_> {
    fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Storage::Empty => None,
            Storage::Borrowed(buf) => Some(&**buf),
            Storage::Owned(buf) => Some(buf.as_slice()),
        }
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::Empty => None,
            Storage::Borrowed(buf) => Some(&mut **buf),
            Storage::Owned(buf) => Some(buf.as_mut_slice()),
        }
    }
}

/// Packet that may own its payload storage
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<'a> {
    header: Header,
    storage: Storage<'a>,
}

impl<'a> Packet<'a> {
    /// Create a packet in the reset state with no buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet owning a zero-filled buffer of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Result<Self, PacketError> {
        let mut packet = Self::new();
        packet.ensure_capacity(capacity, GrowthPolicy::GrowOnly)?;
        Ok(packet)
    }

    /// Create a packet carrying the fields of `header` but no buffer
    pub fn with_header(header: Header) -> Self {
        Self {
            header: header.without_payload(),
            storage: Storage::Empty,
        }
    }

    /// Check if the packet owns its buffer
    pub fn is_owner(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Current storage
    pub fn storage(&self) -> &Storage<'a> {
        &self.storage
    }

    /// Adopt a borrowed buffer
    ///
    /// Any owned buffer is freed first. The payload length is clamped to the
    /// new capacity.
    pub fn assign_external_buffer(&mut self, buffer: &'a mut [u8]) {
        if self.is_owner() {
            self.release();
        }
        self.storage = Storage::Borrowed(buffer);
        let capacity = self.capacity();
        if self.payload_len() > capacity {
            self.header.payload_len = capacity as u16;
        }
    }

    /// Make sure the buffer holds at least `target` bytes
    ///
    /// Whether a buffer that is already large enough gets replaced is up to
    /// `policy`. A replacement buffer is freshly allocated and zero-filled:
    /// the old buffer is released first and the payload length drops to 0.
    ///
    /// On allocation failure the packet is left without a buffer.
    pub fn ensure_capacity(
        &mut self,
        target: usize,
        policy: GrowthPolicy,
    ) -> Result<(), PacketError> {
        let current = self.capacity();
        if !policy.needs_reallocation(current, target) {
            return Ok(());
        }

        debug!("reallocating payload buffer: {} -> {} bytes", current, target);
        self.release_storage();

        if target > MAX_BUFFER_SIZE {
            warn!("payload buffer of {} bytes exceeds 16-bit limit", target);
            return Err(PacketError::AllocationFailure { requested: target });
        }

        match zeroed(target) {
            Ok(buffer) => {
                self.storage = Storage::Owned(buffer);
                Ok(())
            }
            Err(_) => {
                warn!("payload buffer allocation of {} bytes failed", target);
                Err(PacketError::AllocationFailure { requested: target })
            }
        }
    }

    /// Free the buffer if the packet owns it
    ///
    /// A borrowed buffer is left attached.
    pub fn release(&mut self) {
        if self.is_owner() {
            trace!("releasing {} byte payload buffer", self.capacity());
            self.release_storage();
        }
    }

    /// Drop whatever storage is attached and clear the payload
    fn release_storage(&mut self) {
        self.storage = Storage::Empty;
        self.header.payload_len = 0;
    }

    /// Deep copy with independent, owned storage
    pub fn try_clone(&self) -> Result<Packet<'static>, PacketError> {
        Packet::try_clone_from(self)
    }

    /// Hand back the storage, consuming the packet
    pub fn into_storage(self) -> Storage<'a> {
        self.storage
    }

    /// Split into header fields and storage
    pub fn into_parts(self) -> (Header, Storage<'a>) {
        (self.header, self.storage)
    }
}

impl Packet<'static> {
    /// Deep copy of any packet
    ///
    /// The copy gets the source's header fields and a new owned buffer of the
    /// source's full capacity, so it keeps the same headroom for reuse. Only
    /// the payload bytes are copied.
    pub fn try_clone_from<P: PacketBase>(source: &P) -> Result<Self, PacketError> {
        let mut packet = Packet::with_header(*source.header());
        if source.has_buffer() {
            let capacity = source.capacity();
            packet.storage = Storage::Owned(
                zeroed(capacity).map_err(|_| PacketError::AllocationFailure {
                    requested: capacity,
                })?,
            );
            packet.set_payload(source.payload())?;
        }
        Ok(packet)
    }
}

impl<'a> From<FixedPacket<'a>> for Packet<'a> {
    fn from(fixed: FixedPacket<'a>) -> Self {
        let (header, buffer) = fixed.into_parts();
        Self {
            header,
            storage: buffer.map_or(Storage::Empty, Storage::Borrowed),
        }
    }
}

impl RawHeader for Packet<'_> {
    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }
}

impl PacketBase for Packet<'_> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn buffer(&self) -> Option<&[u8]> {
        self.storage.as_slice()
    }

    fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        self.storage.as_mut_slice()
    }

    /// Grow a missing or owned buffer to fit `len` bytes
    ///
    /// A borrowed buffer is never replaced behind the lender's back.
    fn prepare_payload(&mut self, len: usize) -> Result<(), PacketError> {
        if self.has_buffer() && len <= self.capacity() {
            return Ok(());
        }
        if let Storage::Borrowed(_) = self.storage {
            return Err(PacketError::BufferTooSmall {
                required: len,
                capacity: self.capacity(),
            });
        }
        self.ensure_capacity(len, GrowthPolicy::GrowOnly)
    }
}

/// Allocate `len` zero bytes, reporting failure instead of aborting
fn zeroed(len: usize) -> Result<Vec<u8>, TryReserveError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, 0);
    Ok(buffer)
}
