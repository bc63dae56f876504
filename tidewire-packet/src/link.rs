//! Packet I/O over a byte stream
//!
//! The transport (a UART, a USB CDC port, a pipe on the host) only has to
//! implement the `embedded-io` traits. [`PacketWriter`] sends encoded frames
//! and [`PacketReader`] turns the incoming byte stream back into packets.
//! Neither retries: what to do about a rejected frame is up to the caller.

use core::fmt;

use embedded_io::{Read, Write};

use crate::crc::{Checksum, Crc16};
use crate::frame::{FrameError, MAX_FRAME_SIZE};
use crate::packet::PacketBase;
use crate::parser::PacketParser;

/// Buffer size for stream reads
const RX_BUF_SIZE: usize = 64;

/// Errors from packet I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// The underlying stream failed
    Io(E),
    /// A frame could not be encoded, or a received frame was rejected
    Frame(FrameError),
}

impl<E> From<FrameError> for LinkError<E> {
    fn from(err: FrameError) -> Self {
        LinkError::Frame(err)
    }
}

impl<E: fmt::Debug> fmt::Display for LinkError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Io(e) => write!(f, "stream error: {e:?}"),
            LinkError::Frame(e) => write!(f, "{e}"),
        }
    }
}

/// Sends packets as frames on a byte stream
#[derive(Debug)]
pub struct PacketWriter<W> {
    writer: W,
}

impl<W: Write> PacketWriter<W> {
    /// Wrap a byte stream
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encode and send a packet, then flush the stream
    ///
    /// The packet's stored CRC is sent as is, so compute it first.
    /// Returns the number of bytes written.
    pub fn write_packet<P: PacketBase>(
        &mut self,
        packet: &P,
    ) -> Result<usize, LinkError<W::Error>> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let len = packet.encode(&mut frame)?;

        self.writer.write_all(&frame[..len]).map_err(LinkError::Io)?;
        self.writer.flush().map_err(LinkError::Io)?;
        trace!("TX: {} bytes", len);

        Ok(len)
    }

    /// Mutable access to the underlying stream
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Receives packets from a byte stream
///
/// Bytes read past the end of a frame are kept for the next call.
#[derive(Debug)]
pub struct PacketReader<R, C: Checksum = Crc16> {
    reader: R,
    parser: PacketParser<C>,
    buf: [u8; RX_BUF_SIZE],
    pos: usize,
    len: usize,
}

impl<R: Read> PacketReader<R> {
    /// Wrap a byte stream, using a default parser
    pub fn new(reader: R) -> Self {
        Self::with_parser(reader, PacketParser::new())
    }
}

impl<R: Read, C: Checksum> PacketReader<R, C> {
    /// Wrap a byte stream, using `parser`
    pub fn with_parser(reader: R, parser: PacketParser<C>) -> Self {
        Self {
            reader,
            parser,
            buf: [0u8; RX_BUF_SIZE],
            pos: 0,
            len: 0,
        }
    }

    /// Receive the next frame into `packet`
    ///
    /// Blocks on the stream until a complete frame has been parsed and
    /// returns `Ok(true)`, or returns `Ok(false)` once the stream reports
    /// end of input. A rejected frame is reported as
    /// [`LinkError::Frame`]; calling again continues with the bytes after it.
    pub fn read_packet<P: PacketBase>(
        &mut self,
        packet: &mut P,
    ) -> Result<bool, LinkError<R::Error>> {
        loop {
            if self.pos == self.len {
                let n = self.reader.read(&mut self.buf).map_err(LinkError::Io)?;
                if n == 0 {
                    return Ok(false);
                }
                trace!("RX: {} bytes", n);
                self.pos = 0;
                self.len = n;
            }

            while self.pos < self.len {
                let byte = self.buf[self.pos];
                self.pos += 1;
                if self.parser.feed(byte, packet)? {
                    return Ok(true);
                }
            }
        }
    }

    /// Parser state
    pub fn parser(&self) -> &PacketParser<C> {
        &self.parser
    }

    /// Unwrap the underlying stream
    ///
    /// Bytes that were read but not yet parsed are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedPacket;
    use crate::kind::PacketType;

    fn write_frame(out: &mut [u8], iuid: u16, payload: &[u8]) -> usize {
        let mut storage = [0u8; 32];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        packet.set_iuid(iuid);
        packet.set_type(PacketType::Data);
        packet.set_payload(payload).unwrap();
        packet.compute_crc();

        let mut writer = PacketWriter::new(out);
        writer.write_packet(&packet).unwrap()
    }

    #[test]
    fn test_writer_emits_frame() {
        let mut out = [0u8; 32];
        let len = write_frame(&mut out, 0x0001, b"ping");

        assert_eq!(len, 13);
        assert_eq!(&out[..3], &[0x7C, 0x7C, 0x7C]);
        assert_eq!(&out[7..11], b"ping");
    }

    #[test]
    fn test_writer_reports_stream_error() {
        let mut storage = [0u8; 8];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        packet.set_payload(b"12345678").unwrap();

        let mut out = [0u8; 4];
        let mut writer = PacketWriter::new(&mut out[..]);
        assert!(matches!(writer.write_packet(&packet), Err(LinkError::Io(_))));
    }

    #[test]
    fn test_reader_across_chunks() {
        // Longer than one read chunk, preceded by line noise
        let mut stream = [0u8; 128];
        stream[..3].copy_from_slice(&[0x7C, 0x00, 0xFF]);
        let first = write_frame(&mut stream[3..], 10, &[0xAA; 30]);
        let second = write_frame(&mut stream[3 + first..], 11, &[0x55; 20]);
        let total = 3 + first + second;
        assert!(total > RX_BUF_SIZE);

        let mut storage = [0u8; 32];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut reader = PacketReader::new(&stream[..total]);

        assert_eq!(reader.read_packet(&mut packet), Ok(true));
        assert_eq!(packet.iuid(), 10);
        assert_eq!(packet.payload(), &[0xAA; 30]);

        assert_eq!(reader.read_packet(&mut packet), Ok(true));
        assert_eq!(packet.iuid(), 11);
        assert_eq!(packet.payload(), &[0x55; 20]);

        assert_eq!(reader.read_packet(&mut packet), Ok(false));
    }

    #[test]
    fn test_reader_skips_corrupt_frame() {
        let mut stream = [0u8; 64];
        let first = write_frame(&mut stream, 1, b"bad");
        stream[first - 1] ^= 0xFF;
        let second = write_frame(&mut stream[first..], 2, b"good");

        let mut storage = [0u8; 8];
        let mut packet = FixedPacket::with_buffer(&mut storage);
        let mut reader = PacketReader::new(&stream[..first + second]);

        assert!(matches!(
            reader.read_packet(&mut packet),
            Err(LinkError::Frame(FrameError::IntegrityMismatch { .. }))
        ));
        assert_eq!(reader.read_packet(&mut packet), Ok(true));
        assert_eq!(packet.iuid(), 2);
        assert_eq!(packet.payload(), b"good");
    }
}
