//! Unauthenticated drop-in substitute for a secret-stream handshake.
//!
//! A [`NotSecretStream`] wraps a raw byte transport in length-prefixed
//! framing, exchanges public keys and a digest of both keys with its peer,
//! and then passes frames through unchanged. It exposes the same observable
//! surface as a secure stream (public keys, handshake hash, opened signal,
//! half-close and destroy) without any encryption, for local development and
//! testing.
//!
//! ```no_run
//! use not_secret_stream::{NotSecretStream, StreamConfig, StreamEvent};
//!
//! # async fn demo() -> Result<(), not_secret_stream::StreamError> {
//! let (left, right) = tokio::io::duplex(64 * 1024);
//! let mut a = NotSecretStream::new(left, &StreamConfig::default());
//! let mut b = NotSecretStream::new(right, &StreamConfig::default());
//! a.open().await?;
//! b.open().await?;
//! a.write("hello").await?;
//! if let Some(StreamEvent::Data(frame)) = b.recv().await {
//!     assert_eq!(&frame[..], b"hello");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod identity;
pub mod pipe;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{DEFAULT_HIGH_WATER_MARK, StreamConfig};
pub use error::{ConfigError, HandshakeFrame, StreamError};
pub use framing::{DEFAULT_MAX_FRAME_LENGTH, FrameCodec, LengthPrefix};
pub use handshake::{HandshakeEngine, HandshakeOutcome, HandshakeState, HandshakeStep};
pub use identity::{DIGEST_LEN, HandshakeDigest, KeyPair, PUBLIC_KEY_LEN, PublicKey};
pub use stream::{DestroyHandle, HandshakeNotification, NotSecretStream, OpenedSignal, StreamEvent};
