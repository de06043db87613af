//! A peer that speaks the framed wire protocol by hand.
//!
//! Integration tests use [`RawPeer`] where a well-behaved stream cannot
//! produce the situation under test: a wrong digest, a malformed handshake
//! frame, or a peer that stops reading.

use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use not_secret_stream::{FrameCodec, HandshakeDigest, LengthPrefix, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

/// Scripted remote end of a stream.
pub struct RawPeer<T> {
    public_key: PublicKey,
    reader: FramedRead<ReadHalf<T>, FrameCodec>,
    writer: FramedWrite<WriteHalf<T>, FrameCodec>,
}

impl<T> RawPeer<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Wrap `raw` with the default 32-bit framing and a generated key.
    #[must_use]
    pub fn new(raw: T) -> Self { Self::with_prefix(raw, LengthPrefix::default()) }

    /// Wrap `raw` with an explicit prefix width.
    #[must_use]
    pub fn with_prefix(raw: T, prefix: LengthPrefix) -> Self {
        let (read_half, write_half) = tokio::io::split(raw);
        let codec = FrameCodec::new(prefix);
        Self {
            public_key: PublicKey::generate(),
            reader: FramedRead::new(read_half, codec.clone()),
            writer: FramedWrite::new(write_half, codec),
        }
    }

    /// The key this peer announces.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey { self.public_key }

    /// Send one frame and flush it.
    ///
    /// # Errors
    /// Returns the transport error, if any.
    pub async fn send(&mut self, frame: impl Into<Bytes>) -> io::Result<()> {
        self.writer.send(frame.into()).await
    }

    /// Receive the next frame, or `None` at end of input.
    ///
    /// # Errors
    /// Returns the transport or decoding error, if any.
    pub async fn recv(&mut self) -> io::Result<Option<BytesMut>> { self.reader.next().await.transpose() }

    /// Receive the next frame, treating end of input as an error.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::UnexpectedEof`] at end of input.
    pub async fn expect_frame(&mut self) -> io::Result<BytesMut> {
        self.recv()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "peer input ended"))
    }

    /// Exchange public keys and return the remote key.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidData`] if the remote key frame has the
    /// wrong length.
    pub async fn exchange_keys(&mut self) -> io::Result<PublicKey> {
        let hello = Bytes::copy_from_slice(self.public_key.as_bytes());
        self.send(hello).await?;
        let frame = self.expect_frame().await?;
        PublicKey::decode(&frame)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed key frame"))
    }

    /// Complete the handshake honestly and return the remote key.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidData`] if the remote digest does not
    /// match the one this peer computed.
    pub async fn handshake(&mut self) -> io::Result<PublicKey> {
        let remote = self.exchange_keys().await?;
        let digest = HandshakeDigest::compute(&self.public_key, &remote);
        self.send(Bytes::copy_from_slice(digest.as_bytes())).await?;
        let frame = self.expect_frame().await?;
        if HandshakeDigest::decode(&frame) != Some(digest) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "digest mismatch"));
        }
        debug!(remote = %remote, "raw peer handshake completed");
        Ok(remote)
    }

    /// Finish this peer's write side.
    ///
    /// # Errors
    /// Returns the transport error, if any.
    pub async fn finish(&mut self) -> io::Result<()> { self.writer.close().await }
}
