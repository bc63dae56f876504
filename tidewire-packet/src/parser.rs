//! Byte-stream packet parser
//!
//! [`PacketParser`] is fed raw bytes from the transport one at a time and
//! writes the decoded fields straight into a caller-provided packet, so a
//! single packet (and its buffer) can be reused for every received frame.

use core::fmt;

use crate::config::ParserConfig;
use crate::crc::{Checksum, Crc16};
use crate::error::PacketError;
use crate::frame::{FrameError, START_BYTE, START_FLAG};
use crate::packet::PacketBase;

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct PacketParser<C: Checksum = Crc16> {
    state: ParseState,
    config: ParserConfig,
    checksum: C,
    expected_len: u8,
    received: u8,
    crc_high: u8,
}

/// A frame rejected by [`PacketParser::feed_bytes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedError {
    /// Bytes consumed up to and including the one that rejected the frame
    pub consumed: usize,
    /// Why the frame was rejected
    pub error: FrameError,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} bytes)", self.error, self.consumed)
    }
}

impl core::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning for the start flag, with `matched` flag bytes seen so far
    WaitingForStart { matched: u8 },
    /// Got the flag, waiting for the IUID high byte
    WaitingForIuidHigh,
    /// Waiting for the IUID low byte
    WaitingForIuidLow,
    /// Waiting for TYPE
    WaitingForType,
    /// Waiting for LENGTH
    WaitingForLength,
    /// Reading payload bytes
    ReadingPayload,
    /// Waiting for the CRC high byte
    WaitingForCrcHigh,
    /// Waiting for the CRC low byte
    WaitingForCrcLow,
}

impl Default for PacketParser<Crc16> {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketParser<Crc16> {
    /// Create a parser with the default configuration and CRC
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a parser with the default CRC
    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_checksum(config, Crc16::default())
    }
}

impl<C: Checksum> PacketParser<C> {
    /// Create a parser verifying frames with `checksum`
    pub fn with_checksum(config: ParserConfig, checksum: C) -> Self {
        Self {
            state: ParseState::WaitingForStart { matched: 0 },
            config,
            checksum,
            expected_len: 0,
            received: 0,
            crc_high: 0,
        }
    }

    /// Parser configuration
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Check if the parser is between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForStart { matched: 0 }
    }

    /// Reset the parser state
    ///
    /// A partially received frame is abandoned.
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForStart { matched: 0 };
        self.expected_len = 0;
        self.received = 0;
        self.crc_high = 0;
    }

    fn fail(&mut self, err: FrameError) -> Result<bool, FrameError> {
        self.reset();
        Err(err)
    }

    /// Feed a single byte to the parser
    ///
    /// Header fields and payload bytes are written into `packet` as they
    /// arrive. Returns `Ok(true)` once a complete frame has been received
    /// (and its CRC verified, if enabled), `Ok(false)` when more bytes are
    /// needed, or `Err` on a rejected frame. After an error the parser is
    /// back to scanning for a start flag.
    pub fn feed<P: PacketBase>(
        &mut self,
        byte: u8,
        packet: &mut P,
    ) -> Result<bool, FrameError> {
        match self.state {
            ParseState::WaitingForStart { matched } => {
                let matched = if byte == START_BYTE { matched + 1 } else { 0 };
                if matched as usize == START_FLAG.len() {
                    trace!("start flag found");
                    packet.reset();
                    self.state = ParseState::WaitingForIuidHigh;
                } else {
                    // Silently ignore anything that is not a start flag
                    self.state = ParseState::WaitingForStart { matched };
                }
                Ok(false)
            }
            ParseState::WaitingForIuidHigh => {
                if byte == START_BYTE {
                    // Longer flag run; the frame has not started yet
                    return Ok(false);
                }
                packet.set_iuid(u16::from(byte) << 8);
                self.state = ParseState::WaitingForIuidLow;
                Ok(false)
            }
            ParseState::WaitingForIuidLow => {
                let iuid = packet.iuid() | u16::from(byte);
                packet.set_iuid(iuid);
                self.state = ParseState::WaitingForType;
                Ok(false)
            }
            ParseState::WaitingForType => {
                packet.set_type(byte);
                self.state = ParseState::WaitingForLength;
                Ok(false)
            }
            ParseState::WaitingForLength => {
                if byte > self.config.max_payload_len {
                    warn!(
                        "frame length {} exceeds limit {}",
                        byte, self.config.max_payload_len
                    );
                    return self.fail(FrameError::PayloadTooLarge);
                }
                self.expected_len = byte;
                self.received = 0;
                if byte == 0 {
                    self.state = ParseState::WaitingForCrcHigh;
                    return Ok(false);
                }
                if let Err(e) = packet.prepare_payload(byte as usize) {
                    warn!("packet cannot hold {} byte payload", byte);
                    return self.fail(e.into());
                }
                self.state = ParseState::ReadingPayload;
                Ok(false)
            }
            ParseState::ReadingPayload => {
                let slot = packet
                    .buffer_mut()
                    .and_then(|b| b.get_mut(self.received as usize));
                match slot {
                    Some(slot) => *slot = byte,
                    None => {
                        // Buffer was swapped out mid-frame
                        return self.fail(FrameError::Packet(PacketError::UnsetBuffer));
                    }
                }
                self.received += 1;
                if self.received == self.expected_len {
                    if let Err(e) = packet.set_payload_len(self.expected_len as usize) {
                        return self.fail(e.into());
                    }
                    self.state = ParseState::WaitingForCrcHigh;
                }
                Ok(false)
            }
            ParseState::WaitingForCrcHigh => {
                self.crc_high = byte;
                self.state = ParseState::WaitingForCrcLow;
                Ok(false)
            }
            ParseState::WaitingForCrcLow => {
                packet.set_crc(u16::from_be_bytes([self.crc_high, byte]));

                if self.config.verify_crc {
                    if let Err(e) = packet.verify_crc_with(&self.checksum) {
                        warn!("dropping frame: {}", e);
                        return self.fail(e.into());
                    }
                }

                self.reset();
                Ok(true)
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Stops after the first complete frame and returns the number of bytes
    /// consumed, so the caller can continue with the remainder. Returns
    /// `Ok(None)` if every byte was consumed without completing a frame.
    /// A rejected frame also stops the scan; [`FeedError::consumed`] says
    /// where the remainder starts.
    pub fn feed_bytes<P: PacketBase>(
        &mut self,
        bytes: &[u8],
        packet: &mut P,
    ) -> Result<Option<usize>, FeedError> {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte, packet) {
                Ok(true) => return Ok(Some(i + 1)),
                Ok(false) => {}
                Err(error) => {
                    return Err(FeedError {
                        consumed: i + 1,
                        error,
                    })
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedPacket;
    use crate::frame::MAX_FRAME_SIZE;
    use crate::kind::PacketType;

    fn encode(
        iuid: u16,
        packet_type: PacketType,
        payload: &[u8],
    ) -> heapless::Vec<u8, MAX_FRAME_SIZE> {
        let mut storage = [0u8; 255];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        packet.set_iuid(iuid);
        packet.set_type(packet_type);
        packet.set_payload(payload).unwrap();
        packet.compute_crc();
        packet.encode_to_vec().unwrap()
    }

    #[test]
    fn test_roundtrip_into_fixed_packet() {
        let encoded = encode(0x1234, PacketType::Data, &[1, 2, 3, 4, 5]);

        let mut storage = [0u8; 16];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();
        let consumed = parser.feed_bytes(&encoded, &mut packet).unwrap();

        assert_eq!(consumed, Some(encoded.len()));
        assert_eq!(packet.iuid(), 0x1234);
        assert_eq!(packet.packet_type(), PacketType::Data);
        assert_eq!(packet.payload(), &[1, 2, 3, 4, 5]);
        assert_eq!(packet.verify_crc(), Ok(()));
        assert!(parser.is_idle());
    }

    #[test]
    fn test_empty_payload_without_buffer() {
        let encoded = encode(7, PacketType::Ack, &[]);

        let mut packet = FixedPacket::new();
        let mut parser = PacketParser::new();
        assert_eq!(parser.feed_bytes(&encoded, &mut packet), Ok(Some(9)));
        assert_eq!(packet.packet_type(), PacketType::Ack);
        assert_eq!(packet.payload_len(), 0);
    }

    #[test]
    fn test_resync_after_garbage() {
        let encoded = encode(1, PacketType::Nack, b"x");

        let mut data = heapless::Vec::<u8, 32>::new();
        // Includes a partial start flag
        data.extend_from_slice(&[0x00, 0x7C, 0x7C, 0x12, 0x34]).unwrap();
        data.extend_from_slice(&encoded).unwrap();

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();
        let consumed = parser.feed_bytes(&data, &mut packet).unwrap();

        assert_eq!(consumed, Some(data.len()));
        assert_eq!(packet.packet_type(), PacketType::Nack);
        assert_eq!(packet.payload(), b"x");
    }

    #[test]
    fn test_extra_flag_bytes_before_frame() {
        let first = encode(5, PacketType::Data, b"hello");
        let second = encode(6, PacketType::Data, b"world");
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(&[0x7C]).unwrap();
        data.extend_from_slice(&first).unwrap();
        data.extend_from_slice(&[0x7C, 0x7C]).unwrap();
        data.extend_from_slice(&second).unwrap();

        let mut storage = [0u8; 8];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();

        let consumed = parser.feed_bytes(&data, &mut packet).unwrap().unwrap();
        assert_eq!(consumed, 1 + first.len());
        assert_eq!(packet.iuid(), 5);
        assert_eq!(packet.payload(), b"hello");

        let rest = parser.feed_bytes(&data[consumed..], &mut packet).unwrap();
        assert_eq!(rest, Some(2 + second.len()));
        assert_eq!(packet.iuid(), 6);
        assert_eq!(packet.payload(), b"world");
    }

    #[test]
    fn test_invalid_crc() {
        let mut encoded = encode(1, PacketType::Data, b"abc");
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();
        let result = parser.feed_bytes(&encoded, &mut packet);

        assert!(matches!(
            result,
            Err(FeedError {
                error: FrameError::IntegrityMismatch { .. },
                ..
            })
        ));
        assert_eq!(result.unwrap_err().consumed, encoded.len());
        assert!(parser.is_idle());
    }

    #[test]
    fn test_recovers_after_bad_frame() {
        let mut bad = encode(1, PacketType::Data, b"abc");
        bad[8] ^= 0x01; // payload byte
        let good = encode(2, PacketType::Data, b"def");

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();

        assert!(parser.feed_bytes(&bad, &mut packet).is_err());
        assert_eq!(parser.feed_bytes(&good, &mut packet), Ok(Some(good.len())));
        assert_eq!(packet.iuid(), 2);
        assert_eq!(packet.payload(), b"def");
    }

    #[test]
    fn test_resume_after_bad_frame_in_same_chunk() {
        let mut bad = encode(1, PacketType::Data, b"abc");
        bad[8] ^= 0x01;
        let good = encode(2, PacketType::Data, b"def");
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(&bad).unwrap();
        data.extend_from_slice(&good).unwrap();

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();

        let err = parser.feed_bytes(&data, &mut packet).unwrap_err();
        assert!(matches!(err.error, FrameError::IntegrityMismatch { .. }));
        assert_eq!(err.consumed, bad.len());

        let rest = &data[err.consumed..];
        assert_eq!(parser.feed_bytes(rest, &mut packet), Ok(Some(good.len())));
        assert_eq!(packet.iuid(), 2);
        assert_eq!(packet.payload(), b"def");
    }

    #[test]
    fn test_crc_check_can_be_disabled() {
        let mut encoded = encode(1, PacketType::Data, b"abc");
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let config = ParserConfig::default().with_verify_crc(false);
        let mut parser = PacketParser::with_config(config);

        let consumed = parser.feed_bytes(&encoded, &mut packet);
        assert_eq!(consumed, Ok(Some(encoded.len())));
        assert!(packet.verify_crc().is_err());
    }

    #[test]
    fn test_length_over_limit() {
        let encoded = encode(1, PacketType::Data, &[0u8; 10]);

        let mut storage = [0u8; 16];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let config = ParserConfig::default().with_max_payload_len(8);
        let mut parser = PacketParser::with_config(config);

        // Rejected at the LENGTH byte
        assert_eq!(
            parser.feed_bytes(&encoded, &mut packet),
            Err(FeedError {
                consumed: 7,
                error: FrameError::PayloadTooLarge
            })
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_fixed_buffer_too_small() {
        let encoded = encode(1, PacketType::Data, &[0u8; 10]);

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();

        assert_eq!(
            parser.feed_bytes(&encoded, &mut packet),
            Err(FeedError {
                consumed: 7,
                error: FrameError::Packet(PacketError::BufferTooSmall {
                    required: 10,
                    capacity: 4
                })
            })
        );
    }

    #[test]
    fn test_unrecognized_type_passes_through() {
        let encoded = encode(1, PacketType::Unrecognized(0x77), b"?");

        let mut storage = [0u8; 4];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();
        parser.feed_bytes(&encoded, &mut packet).unwrap();

        assert_eq!(packet.packet_type(), PacketType::Unrecognized(0x77));
    }

    #[test]
    fn test_back_to_back_frames() {
        let first = encode(1, PacketType::Stream, b"one");
        let second = encode(2, PacketType::Stream, b"two");
        let mut data = heapless::Vec::<u8, 64>::new();
        data.extend_from_slice(&first).unwrap();
        data.extend_from_slice(&second).unwrap();

        let mut storage = [0u8; 8];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut parser = PacketParser::new();

        let consumed = parser.feed_bytes(&data, &mut packet).unwrap().unwrap();
        assert_eq!(consumed, first.len());
        assert_eq!(packet.payload(), b"one");

        let rest = parser.feed_bytes(&data[consumed..], &mut packet).unwrap();
        assert_eq!(rest, Some(second.len()));
        assert_eq!(packet.payload(), b"two");
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_parse_into_owned_packet_grows() {
        use crate::owned::Packet;

        let encoded = encode(3, PacketType::Data, &[9u8; 100]);
        let mut packet = Packet::new();
        let mut parser = PacketParser::new();

        parser.feed_bytes(&encoded, &mut packet).unwrap();
        assert!(packet.is_owner());
        assert_eq!(packet.capacity(), 100);
        assert_eq!(packet.payload(), &[9u8; 100]);

        // Smaller frame reuses the same buffer
        let small = encode(3, PacketType::Data, b"hi");
        parser.feed_bytes(&small, &mut packet).unwrap();
        assert_eq!(packet.capacity(), 100);
        assert_eq!(packet.payload(), b"hi");
    }
}
