//! Parser configuration
//!
//! Configuration is built in code by the host application; with the `serde`
//! feature it can also be embedded in the host's own configuration format.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::frame::MAX_PAYLOAD_SIZE;

/// Settings for [`PacketParser`](crate::PacketParser)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    /// Largest payload accepted; longer frames are rejected before their
    /// payload is read
    pub max_payload_len: u8,
    /// Check the CRC of every received frame
    pub verify_crc: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_payload_len: MAX_PAYLOAD_SIZE as u8,
            verify_crc: true,
        }
    }
}

impl ParserConfig {
    /// Limit the accepted payload length
    pub const fn with_max_payload_len(mut self, max_payload_len: u8) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    /// Enable or disable CRC verification
    pub const fn with_verify_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }
}
