//! The not-secret stream: a duplex adapter over a framed transport.
//!
//! [`NotSecretStream::new`] wraps a raw byte transport, spawns a driver task
//! that performs the public-key and digest handshake, and then passes frames
//! through unchanged. The consumer writes with [`NotSecretStream::write`] and
//! receives [`StreamEvent`]s through [`NotSecretStream::recv`] or the
//! [`Stream`] implementation.
//!
//! Destruction is idempotent. Whoever triggers it first (the consumer, a
//! [`DestroyHandle`], a transport failure or a failed handshake) tears down
//! the transport exactly once, settles the opened signal, fails any pending
//! write with [`StreamError::StreamDestroyed`] and emits a final
//! [`StreamEvent::Close`].

mod driver;
mod lifecycle;

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::Stream;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot, watch},
};
use tracing::debug;

use self::{
    driver::{Control, Driver},
    lifecycle::{Lifecycle, OpenState, Outbound},
};
use crate::{
    config::StreamConfig,
    error::StreamError,
    handshake::{HandshakeEngine, HandshakeOutcome},
    identity::{HandshakeDigest, PublicKey},
};

/// Notification delivered to the consumer of a stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    /// A frame received after the handshake completed.
    Data(Bytes),
    /// The remote peer finished writing.
    End,
    /// A write that saturated the transport has been flushed.
    Drain,
    /// The stream was destroyed with this reason.
    Error(StreamError),
    /// The stream was destroyed. Always the last event.
    Close,
}

/// Unauthenticated drop-in for a secret stream.
///
/// Both peers exchange public keys and a digest of the two keys; the stream
/// opens when the digests agree. No encryption or authentication is
/// performed.
pub struct NotSecretStream {
    public_key: PublicKey,
    control: mpsc::UnboundedSender<Control>,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    opened: watch::Receiver<OpenState>,
    handshake: Option<oneshot::Receiver<Result<(), StreamError>>>,
    ended: bool,
}

impl NotSecretStream {
    /// Wrap `raw` and start the handshake.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime, since the driver task is
    /// spawned immediately.
    pub fn new<T>(raw: T, config: &StreamConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let public_key = config.resolve_public_key();
        let (lifecycle, observers) = Lifecycle::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(
            raw,
            config.codec(),
            config.high_water_mark(),
            HandshakeEngine::new(public_key),
            lifecycle,
            control_rx,
            outbound_rx,
        );
        tokio::spawn(driver.run());

        Self {
            public_key,
            control: control_tx,
            outbound: outbound_tx,
            events: observers.events,
            opened: observers.opened,
            handshake: Some(observers.handshake),
            ended: false,
        }
    }

    /// Local public key announced to the peer.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey { self.public_key }

    /// Remote public key, once the handshake has completed.
    #[must_use]
    pub fn remote_public_key(&self) -> Option<PublicKey> {
        self.outcome().map(|outcome| outcome.remote_public_key)
    }

    /// Digest agreed by both peers, once the handshake has completed.
    #[must_use]
    pub fn handshake_hash(&self) -> Option<HandshakeDigest> {
        self.outcome().map(|outcome| outcome.digest)
    }

    fn outcome(&self) -> Option<HandshakeOutcome> {
        match &*self.opened.borrow() {
            OpenState::Opened(outcome) => Some(*outcome),
            OpenState::Pending | OpenState::Failed(_) => None,
        }
    }

    /// Signal that resolves to `true` on completion and `false` on failure.
    #[must_use]
    pub fn opened(&self) -> OpenedSignal {
        OpenedSignal {
            state: self.opened.clone(),
        }
    }

    /// Take the one-time handshake notification.
    ///
    /// Returns `None` once it has already been taken.
    pub fn handshake(&mut self) -> Option<HandshakeNotification> {
        self.handshake
            .take()
            .map(|rx| HandshakeNotification { rx })
    }

    /// Wait for the handshake to conclude.
    ///
    /// # Errors
    /// Returns the error that prevented the stream from opening.
    pub async fn open(&self) -> Result<(), StreamError> {
        let mut state = self.opened.clone();
        let settled = state
            .wait_for(|open| !open.is_pending())
            .await
            .map(|open| open.clone());
        match settled {
            Ok(OpenState::Opened(_)) => Ok(()),
            Ok(OpenState::Failed(err)) => Err(err),
            Ok(OpenState::Pending) | Err(_) => Err(StreamError::TransportDestroyed),
        }
    }

    /// Write one frame to the peer.
    ///
    /// Writes issued before the handshake completes are held and sent in
    /// order once it does. The returned future resolves once the transport
    /// has accepted the frame, which is delayed until a drain when the write
    /// saturates it.
    ///
    /// # Errors
    /// - [`StreamError::WriteAfterEnd`] after [`NotSecretStream::end`].
    /// - [`StreamError::StreamDestroyed`] when the stream is destroyed before
    ///   the write is acknowledged.
    pub async fn write(&self, chunk: impl Into<Bytes>) -> Result<(), StreamError> {
        if self.ended {
            return Err(StreamError::WriteAfterEnd);
        }
        let (ack, acked) = oneshot::channel();
        let request = Outbound::Write {
            chunk: chunk.into(),
            ack,
        };
        if self.outbound.send(request).is_err() {
            return Err(StreamError::StreamDestroyed);
        }
        acked.await.unwrap_or(Err(StreamError::StreamDestroyed))
    }

    /// Finish the local write side once earlier writes have been sent.
    ///
    /// The stream closes after both sides have ended.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        if self.outbound.send(Outbound::End).is_err() {
            debug!("end requested on destroyed stream");
        }
    }

    /// Destroy the stream, optionally with a reason forwarded to the
    /// [`StreamEvent::Error`] event. Later calls have no effect.
    pub fn destroy(&self, reason: Option<StreamError>) { send_destroy(&self.control, reason); }

    /// A cloneable handle that can destroy the stream from another task.
    #[must_use]
    pub fn destroyer(&self) -> DestroyHandle {
        DestroyHandle {
            control: self.control.clone(),
        }
    }

    /// Receive the next event. Returns `None` after [`StreamEvent::Close`].
    pub async fn recv(&mut self) -> Option<StreamEvent> { self.events.recv().await }

    /// Accepted for compatibility with the secret stream; has no effect.
    pub fn set_keep_alive(&self, interval_ms: u64) {
        debug!(local = %self.public_key, interval_ms, "keep-alive is not supported; ignoring");
    }
}

impl Stream for NotSecretStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for NotSecretStream {
    fn drop(&mut self) { send_destroy(&self.control, None); }
}

impl std::fmt::Debug for NotSecretStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotSecretStream")
            .field("public_key", &self.public_key)
            .field("remote_public_key", &self.remote_public_key())
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

fn send_destroy(control: &mpsc::UnboundedSender<Control>, reason: Option<StreamError>) {
    if control.send(Control::Destroy(reason)).is_err() {
        debug!("stream already destroyed");
    }
}

/// Destroys a stream from outside the task that owns it.
#[derive(Clone, Debug)]
pub struct DestroyHandle {
    control: mpsc::UnboundedSender<Control>,
}

impl DestroyHandle {
    /// Destroy the stream; see [`NotSecretStream::destroy`].
    pub fn destroy(&self, reason: Option<StreamError>) { send_destroy(&self.control, reason); }
}

/// Observes whether the stream opened.
#[derive(Clone, Debug)]
pub struct OpenedSignal {
    state: watch::Receiver<OpenState>,
}

impl OpenedSignal {
    /// Resolve to `true` once the handshake completes, or `false` if the
    /// stream is destroyed first.
    pub async fn wait(mut self) -> bool {
        let settled = self.state.wait_for(|open| !open.is_pending()).await;
        matches!(settled.as_deref(), Ok(OpenState::Opened(_)))
    }
}

/// Resolves once with the outcome of the handshake.
#[derive(Debug)]
pub struct HandshakeNotification {
    rx: oneshot::Receiver<Result<(), StreamError>>,
}

impl Future for HandshakeNotification {
    type Output = Result<(), StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(StreamError::TransportDestroyed)))
    }
}
