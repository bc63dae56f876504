//! Tidewire serial packets
//!
//! This crate defines the packet format used on point-to-point serial links
//! between a host and small devices, and the in-memory packet types that
//! carry it. The format is deliberately fixed so that the smallest targets can
//! parse it without allocation.
//!
//! # Frame Format
//!
//! ```text
//! ┌────────────┬──────┬──────┬────────┬──────────────┬──────┐
//! │ START FLAG │ IUID │ TYPE │ LENGTH │ PAYLOAD      │ CRC  │
//! │ 3B `|||`   │ 2B   │ 1B   │ 1B     │ 0–255B       │ 2B   │
//! └────────────┴──────┴──────┴────────┴──────────────┴──────┘
//! ```
//!
//! Multi-byte fields are big-endian. The CRC covers the payload bytes only.
//!
//! # Packet Storage
//!
//! Every packet variant shares the operations of [`PacketBase`]; they differ
//! only in who is responsible for the payload storage:
//!
//! - [`FixedPacket`] borrows a caller-provided buffer and never allocates.
//! - [`Packet`] (feature `alloc`) may own a heap buffer that it grows on
//!   demand according to a [`GrowthPolicy`], or borrow one like `FixedPacket`.
//! - [`Packet::try_clone`] produces an independent deep copy with its own
//!   storage.

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[macro_use]
mod fmt;

pub mod config;
pub mod crc;
pub mod error;
pub mod fixed;
pub mod frame;
pub mod kind;
pub mod link;
#[cfg(feature = "alloc")]
pub mod owned;
pub mod packet;
pub mod parser;

pub use config::ParserConfig;
pub use crc::{Checksum, Crc16, CRC_RESET};
pub use error::PacketError;
pub use fixed::FixedPacket;
pub use frame::{
    is_valid_iuid, FrameError, HEADER_LEN, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, START_FLAG,
};
pub use kind::PacketType;
pub use link::{LinkError, PacketReader, PacketWriter};
#[cfg(feature = "alloc")]
pub use owned::{GrowthPolicy, Packet, Storage};
pub use packet::{Header, PacketBase};
pub use parser::{FeedError, PacketParser};
