//! Tokio codec for length-prefixed framing.
//!
//! This module provides a [`FrameCodec`] that implements Tokio's [`Decoder`]
//! and [`Encoder`] traits so a raw byte stream can be wrapped with
//! [`tokio_util::codec::FramedRead`] and [`tokio_util::codec::FramedWrite`].
//! It is the framed transport the handshake and pass-through modes run on.
//!
//! # Frame Format
//!
//! | Field   | Size           | Description                                  |
//! |---------|----------------|----------------------------------------------|
//! | length  | `bits / 8`     | Payload length, unsigned little-endian       |
//! | payload | `length`       | Opaque message bytes                         |
//!
//! The prefix width is selected by [`LengthPrefix`]; the default is 32 bits.
//! Frames longer than the configured maximum are rejected in both directions.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::error::ConfigError;

/// Width of the length prefix written before every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LengthPrefix {
    /// One-byte prefix; frames of up to 255 bytes.
    U8,
    /// Two-byte prefix.
    U16,
    /// Three-byte prefix.
    U24,
    /// Four-byte prefix.
    #[default]
    U32,
}

impl LengthPrefix {
    /// Select a prefix from a width in bits.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFramingBits`] unless `bits` is 8, 16,
    /// 24 or 32.
    pub const fn from_bits(bits: u8) -> Result<Self, ConfigError> {
        match bits {
            8 => Ok(Self::U8),
            16 => Ok(Self::U16),
            24 => Ok(Self::U24),
            32 => Ok(Self::U32),
            other => Err(ConfigError::UnsupportedFramingBits(other)),
        }
    }

    /// Width of the prefix in bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U24 => 24,
            Self::U32 => 32,
        }
    }

    /// Width of the prefix in bytes.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U24 => 3,
            Self::U32 => 4,
        }
    }

    /// Largest payload the prefix can describe.
    #[must_use]
    pub const fn max_payload(self) -> usize {
        match self {
            Self::U8 => 0xff,
            Self::U16 => 0xffff,
            Self::U24 => 0x00ff_ffff,
            Self::U32 => 0xffff_ffff,
        }
    }
}

/// Largest frame accepted or produced unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Tokio codec for length-prefixed frames.
///
/// A thin layer over [`LengthDelimitedCodec`] that fixes the header to a
/// little-endian [`LengthPrefix`] and bounds every frame. A header announcing
/// more than [`FrameCodec::max_frame_length`] bytes fails decoding with
/// [`io::ErrorKind::InvalidData`] before any payload space is reserved.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    prefix: LengthPrefix,
    inner: LengthDelimitedCodec,
    mid_frame: bool,
}

impl FrameCodec {
    /// Create a codec with the given prefix width and the default frame
    /// limit.
    #[must_use]
    pub fn new(prefix: LengthPrefix) -> Self {
        Self::with_max_frame_length(prefix, DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Create a codec that rejects frames longer than `max_frame_length`.
    ///
    /// The limit is clamped to what `prefix` can describe.
    #[must_use]
    pub fn with_max_frame_length(prefix: LengthPrefix, max_frame_length: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(prefix.len())
            .little_endian()
            .max_frame_length(max_frame_length.min(prefix.max_payload()))
            .new_codec();
        Self {
            prefix,
            inner,
            mid_frame: false,
        }
    }

    /// Return the configured prefix width.
    #[must_use]
    pub const fn prefix(&self) -> LengthPrefix { self.prefix }

    /// Largest payload, in bytes, this codec decodes or encodes.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.inner.max_frame_length() }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(LengthPrefix::default()) }
}

impl Decoder for FrameCodec {
    type Error = io::Error;
    type Item = BytesMut;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let buffered = src.len();
        let frame = self.inner.decode(src)?;
        // The inner codec consumes the header before the payload is complete.
        self.mid_frame = frame.is_none() && (self.mid_frame || src.len() < buffered);
        Ok(frame)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() && !self.mid_frame => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "transport closed mid-frame",
            )),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_length() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame of {} bytes exceeds the {}-byte limit of the {}-bit length prefix",
                    item.len(),
                    self.max_frame_length(),
                    self.prefix.bits()
                ),
            ));
        }
        self.inner.encode(item, dst)
    }
}

#[cfg(test)]
mod tests;
