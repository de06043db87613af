//! Destroy-once bookkeeping and one-shot settlement for a stream.
//!
//! [`Lifecycle`] owns every channel through which the driver reports to the
//! consumer: the opened signal, the handshake notification, the event queue
//! and the acknowledgment of the single outstanding write. Each of them is
//! settled at most once, and [`Lifecycle::finish_destroy`] settles whatever
//! is still open when the stream is torn down.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use super::StreamEvent;
use crate::{error::StreamError, handshake::HandshakeOutcome};

/// Acknowledgment channel for a single write.
pub(crate) type WriteAck = oneshot::Sender<Result<(), StreamError>>;

/// Handshake result as observed by the consumer.
#[derive(Clone, Debug)]
pub(crate) enum OpenState {
    Pending,
    Opened(HandshakeOutcome),
    Failed(StreamError),
}

impl OpenState {
    pub(crate) const fn is_pending(&self) -> bool { matches!(self, Self::Pending) }
}

/// Independent completion flags for the two directions of the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct StreamHalves {
    read_ended: bool,
    write_ended: bool,
}

impl StreamHalves {
    pub(crate) const fn read_ended(self) -> bool { self.read_ended }

    pub(crate) const fn fully_ended(self) -> bool { self.read_ended && self.write_ended }

    /// Mark the read side ended; returns `false` if it already was.
    pub(crate) fn end_read(&mut self) -> bool {
        if self.read_ended {
            return false;
        }
        self.read_ended = true;
        debug!(write_ended = self.write_ended, "remote end of input");
        true
    }

    /// Mark the write side ended; returns `false` if it already was.
    pub(crate) fn end_write(&mut self) -> bool {
        if self.write_ended {
            return false;
        }
        self.write_ended = true;
        debug!(read_ended = self.read_ended, "local write side finished");
        true
    }
}

/// The one write whose acknowledgment is deferred until the transport drains.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    ack: WriteAck,
}

impl PendingWrite {
    pub(crate) const fn new(ack: WriteAck) -> Self { Self { ack } }

    pub(crate) fn resolve(self, result: Result<(), StreamError>) {
        if self.ack.send(result).is_err() {
            debug!("write acknowledgment dropped by consumer");
        }
    }
}

/// Receiving ends handed to the consumer-facing stream.
pub(crate) struct Observers {
    pub(crate) events: mpsc::UnboundedReceiver<StreamEvent>,
    pub(crate) opened: watch::Receiver<OpenState>,
    pub(crate) handshake: oneshot::Receiver<Result<(), StreamError>>,
}

/// Driver-side settlement state.
pub(crate) struct Lifecycle {
    events: mpsc::UnboundedSender<StreamEvent>,
    opened: watch::Sender<OpenState>,
    handshake: Option<oneshot::Sender<Result<(), StreamError>>>,
    pending: Option<PendingWrite>,
    halves: StreamHalves,
    destroyed: bool,
}

impl Lifecycle {
    pub(crate) fn new() -> (Self, Observers) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (opened_tx, opened_rx) = watch::channel(OpenState::Pending);
        let (handshake_tx, handshake_rx) = oneshot::channel();
        let lifecycle = Self {
            events: events_tx,
            opened: opened_tx,
            handshake: Some(handshake_tx),
            pending: None,
            halves: StreamHalves::default(),
            destroyed: false,
        };
        let observers = Observers {
            events: events_rx,
            opened: opened_rx,
            handshake: handshake_rx,
        };
        (lifecycle, observers)
    }

    pub(crate) const fn is_destroyed(&self) -> bool { self.destroyed }

    pub(crate) const fn halves(&self) -> StreamHalves { self.halves }

    pub(crate) const fn has_pending_write(&self) -> bool { self.pending.is_some() }

    pub(crate) fn emit(&self, event: StreamEvent) {
        if self.events.send(event).is_err() {
            debug!("stream event dropped; consumer is gone");
        }
    }

    /// Settle the opened signal and the handshake notification.
    ///
    /// Only the first call has any effect.
    pub(crate) fn settle_open(&mut self, result: Result<HandshakeOutcome, StreamError>) {
        let Some(notify) = self.handshake.take() else {
            return;
        };
        let (state, notification) = match result {
            Ok(outcome) => (OpenState::Opened(outcome), Ok(())),
            Err(err) => (OpenState::Failed(err.clone()), Err(err)),
        };
        self.opened.send_modify(|current| *current = state);
        if notify.send(notification).is_err() {
            debug!("handshake notification dropped by consumer");
        }
    }

    /// Hold `write` until the transport drains.
    pub(crate) fn defer_write(&mut self, write: PendingWrite) {
        if let Some(previous) = self.pending.replace(write) {
            previous.resolve(Err(StreamError::StreamDestroyed));
        }
    }

    /// Acknowledge the deferred write, if any, after a drain.
    pub(crate) fn drained(&mut self) {
        if let Some(write) = self.pending.take() {
            debug!("transport drained; acknowledging deferred write");
            write.resolve(Ok(()));
            self.emit(StreamEvent::Drain);
        }
    }

    /// Record remote end of input and tell the consumer.
    pub(crate) fn end_read(&mut self) {
        if self.halves.end_read() {
            self.emit(StreamEvent::End);
        }
    }

    pub(crate) fn end_write(&mut self) { self.halves.end_write(); }

    /// Claim the teardown. Returns `true` for the first caller only.
    pub(crate) fn begin_destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        true
    }

    /// Settle everything still outstanding after the transport is gone.
    pub(crate) fn finish_destroy(&mut self, reason: Option<StreamError>) {
        if let Some(write) = self.pending.take() {
            write.resolve(Err(StreamError::StreamDestroyed));
        }
        self.settle_open(Err(reason
            .clone()
            .unwrap_or(StreamError::TransportDestroyed)));
        if let Some(err) = reason {
            self.emit(StreamEvent::Error(err));
        }
        self.emit(StreamEvent::Close);
    }
}

/// Payload of a consumer write travelling to the driver.
#[derive(Debug)]
pub(crate) enum Outbound {
    Write { chunk: Bytes, ack: WriteAck },
    End,
}
