//! Error types for the not-secret stream.
//!
//! [`StreamError`] is cloneable so that a single failure can settle every
//! observer of a stream: the error event, the opened signal, the handshake
//! notification and any pending write acknowledgment.

use std::{error::Error as StdError, io, sync::Arc};

use thiserror::Error;

/// Which handshake frame failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeFrame {
    /// The first frame, carrying the remote public key.
    PublicKey,
    /// The second frame, carrying the remote handshake digest.
    Digest,
}

impl std::fmt::Display for HandshakeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicKey => f.write_str("public key"),
            Self::Digest => f.write_str("handshake digest"),
        }
    }
}

/// Errors surfaced by a [`NotSecretStream`](crate::NotSecretStream).
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The remote digest disagrees with the locally computed one.
    #[error("handshake failed")]
    HandshakeMismatch,
    /// A frame reached the handshake engine after it had concluded.
    #[error("the unreachable was reached")]
    UnreachableState,
    /// The stream was torn down without a more specific reason.
    #[error("transport destroyed")]
    TransportDestroyed,
    /// A write was still awaiting acknowledgment when the stream was destroyed.
    #[error("stream destroyed")]
    StreamDestroyed,
    /// A write was issued after the local side finished.
    #[error("write after end")]
    WriteAfterEnd,
    /// A handshake frame had the wrong length.
    #[error("invalid {kind} frame: expected {expected} bytes, received {actual}")]
    InvalidFrame {
        /// Frame being decoded.
        kind: HandshakeFrame,
        /// Required payload length.
        expected: usize,
        /// Received payload length.
        actual: usize,
    },
    /// Error reported by the underlying transport, forwarded verbatim.
    #[error(transparent)]
    Transport(Arc<io::Error>),
    /// Caller-supplied destroy reason, forwarded verbatim.
    #[error(transparent)]
    Custom(Arc<dyn StdError + Send + Sync>),
}

impl StreamError {
    /// Wrap an arbitrary error as a caller-supplied destroy reason.
    pub fn custom(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Custom(Arc::from(err.into()))
    }

    /// Returns `true` when the error originated from the transport rather than
    /// from the handshake.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::TransportDestroyed)
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self { Self::Transport(Arc::new(err)) }
}

/// Errors raised while validating stream or CLI configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The length-prefix width is not one of 8, 16, 24 or 32 bits.
    #[error("unsupported framing size of {0} bits (expected 8, 16, 24 or 32)")]
    UnsupportedFramingBits(u8),
    /// A hex-encoded public key could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// The high-water mark must allow at least one byte to be buffered.
    #[error("high-water mark must be greater than zero")]
    ZeroHighWaterMark,
    /// Frames must be allowed to carry at least one byte.
    #[error("maximum frame length must be greater than zero")]
    ZeroMaxFrameLength,
}
