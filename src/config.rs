//! Construction options for a [`NotSecretStream`](crate::NotSecretStream).
//!
//! Mirrors the `{ keyPair?: { publicKey }, framingSizeBits? }` options of the
//! secure stream this crate substitutes for, plus the write high-water mark
//! and the largest frame either side will accept.

use crate::{
    error::ConfigError,
    framing::{DEFAULT_MAX_FRAME_LENGTH, FrameCodec, LengthPrefix},
    identity::{KeyPair, PublicKey},
};

/// Write buffer size at which the transport reports saturation.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Options recognised when constructing a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    key_pair: Option<KeyPair>,
    framing: LengthPrefix,
    high_water_mark: usize,
    max_frame_length: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            key_pair: None,
            framing: LengthPrefix::default(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl StreamConfig {
    /// Use a caller-supplied identity instead of generating one.
    #[must_use]
    pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Set the length-prefix width used by the framed transport.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFramingBits`] unless `bits` is 8, 16,
    /// 24 or 32.
    pub fn with_framing_size_bits(mut self, bits: u8) -> Result<Self, ConfigError> {
        self.framing = LengthPrefix::from_bits(bits)?;
        Ok(self)
    }

    /// Set the number of buffered bytes after which writes wait for drain.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroHighWaterMark`] when `bytes` is zero.
    pub fn with_high_water_mark(mut self, bytes: usize) -> Result<Self, ConfigError> {
        if bytes == 0 {
            return Err(ConfigError::ZeroHighWaterMark);
        }
        self.high_water_mark = bytes;
        Ok(self)
    }

    /// Reject frames longer than `bytes` in either direction.
    ///
    /// The limit is clamped to what the framing width can describe.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroMaxFrameLength`] when `bytes` is zero.
    pub fn with_max_frame_length(mut self, bytes: usize) -> Result<Self, ConfigError> {
        if bytes == 0 {
            return Err(ConfigError::ZeroMaxFrameLength);
        }
        self.max_frame_length = bytes;
        Ok(self)
    }

    /// Caller-supplied key pair, if any.
    #[must_use]
    pub const fn key_pair(&self) -> Option<&KeyPair> { self.key_pair.as_ref() }

    /// Length-prefix width for the framed transport.
    #[must_use]
    pub const fn framing(&self) -> LengthPrefix { self.framing }

    /// Write high-water mark in bytes.
    #[must_use]
    pub const fn high_water_mark(&self) -> usize { self.high_water_mark }

    /// Largest frame, in bytes, as configured.
    #[must_use]
    pub const fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Codec for the framed transport described by these options.
    #[must_use]
    pub fn codec(&self) -> FrameCodec {
        FrameCodec::with_max_frame_length(self.framing, self.max_frame_length)
    }

    /// Resolve the local public key, generating one when none was supplied.
    #[must_use]
    pub fn resolve_public_key(&self) -> PublicKey {
        self.key_pair
            .map_or_else(PublicKey::generate, |pair| pair.public_key)
    }
}
