//! Raw transports for driving streams in tests.

use std::{
    io,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Two connected in-memory transports, each buffering up to `capacity` bytes
/// per direction.
#[must_use]
pub fn transport_pair(capacity: usize) -> (DuplexStream, DuplexStream) { tokio::io::duplex(capacity) }

/// Shared count of dropped [`CountingTransport`]s.
#[derive(Clone, Debug, Default)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    /// Number of wrapped transports dropped so far.
    #[must_use]
    pub fn drops(&self) -> usize { self.0.load(Ordering::SeqCst) }
}

/// Transport wrapper that records when it is dropped.
///
/// Dropping the raw transport is how a stream tears it down, so the counter
/// shows how many times teardown happened.
#[derive(Debug)]
pub struct CountingTransport<T> {
    inner: T,
    counter: DropCounter,
}

impl<T> CountingTransport<T> {
    /// Wrap `inner`, returning the wrapper and its drop counter.
    #[must_use]
    pub fn new(inner: T) -> (Self, DropCounter) {
        let counter = DropCounter::default();
        (
            Self {
                inner,
                counter: counter.clone(),
            },
            counter,
        )
    }
}

impl<T> Drop for CountingTransport<T> {
    fn drop(&mut self) { self.counter.0.fetch_add(1, Ordering::SeqCst); }
}

impl<T: AsyncRead + Unpin> AsyncRead for CountingTransport<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for CountingTransport<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
