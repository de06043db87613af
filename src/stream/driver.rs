//! Background task that owns the framed transport.
//!
//! The driver is the only place the transport, the handshake engine and the
//! lifecycle are mutated. It multiplexes consumer requests, inbound frames and
//! outbound flushing in a single `select!` loop, so every transition happens
//! in one execution context.

use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use super::{
    StreamEvent,
    lifecycle::{Lifecycle, Outbound, PendingWrite, WriteAck},
};
use crate::{
    error::StreamError,
    framing::FrameCodec,
    handshake::{HandshakeEngine, HandshakeState, HandshakeStep},
};

type FrameWriter<T> = FramedWrite<WriteHalf<T>, FrameCodec>;

/// Framed halves of the raw transport.
struct Transport<T> {
    reader: FramedRead<ReadHalf<T>, FrameCodec>,
    writer: FrameWriter<T>,
}

impl<T> Transport<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn new(raw: T, codec: FrameCodec, high_water_mark: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(raw);
        let reader = FramedRead::new(read_half, codec.clone());
        let mut writer = FramedWrite::new(write_half, codec);
        writer.set_backpressure_boundary(high_water_mark);
        Self { reader, writer }
    }
}

/// Consumer requests that bypass the ordered outbound queue.
#[derive(Debug)]
pub(crate) enum Control {
    Destroy(Option<StreamError>),
}

pub(crate) struct Driver<T> {
    transport: Option<Transport<T>>,
    engine: HandshakeEngine,
    lifecycle: Lifecycle,
    control: mpsc::UnboundedReceiver<Control>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    outbound_open: bool,
    high_water_mark: usize,
    ending: bool,
    closing: bool,
}

impl<T> Driver<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn new(
        raw: T,
        codec: FrameCodec,
        high_water_mark: usize,
        engine: HandshakeEngine,
        lifecycle: Lifecycle,
        control: mpsc::UnboundedReceiver<Control>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
    ) -> Self {
        Self {
            transport: Some(Transport::new(raw, codec, high_water_mark)),
            engine,
            lifecycle,
            control,
            outbound,
            outbound_open: true,
            high_water_mark,
            ending: false,
            closing: false,
        }
    }

    /// Run until the stream is destroyed.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! macro usage"
    )]
    pub(crate) async fn run(mut self) {
        debug!(
            local = %self.engine.public_key(),
            framing_bits = self.codec_bits(),
            "stream driver started"
        );
        let hello = self.engine.hello();
        self.send_frame(hello).await;

        while !self.lifecycle.is_destroyed() {
            let accepts_outbound = self.accepts_outbound();
            let reading = !self.lifecycle.halves().read_ended();
            let closing = self.closing;
            let Some(transport) = self.transport.as_mut() else {
                break;
            };
            let flushing = closing || !transport.writer.write_buffer().is_empty();

            tokio::select! {
                biased;
                control = self.control.recv() => self.on_control(control),
                outbound = self.outbound.recv(), if accepts_outbound => self.on_outbound(outbound).await,
                next = transport.reader.next(), if reading => self.on_frame(next).await,
                result = drive_writer(&mut transport.writer, closing), if flushing => self.on_written(result, closing),
            }
        }
        debug!("stream driver stopped");
    }

    fn codec_bits(&self) -> Option<u8> {
        self.transport
            .as_ref()
            .map(|transport| transport.writer.encoder().prefix().bits())
    }

    /// Consumer writes are taken off the queue only once pass-through is
    /// active and the previous write has been acknowledged.
    fn accepts_outbound(&self) -> bool {
        self.outbound_open
            && self.engine.state() == HandshakeState::Completed
            && !self.lifecycle.has_pending_write()
            && !self.closing
    }

    fn on_control(&mut self, control: Option<Control>) {
        match control {
            Some(Control::Destroy(reason)) => self.destroy(reason),
            None => {
                debug!("all stream handles dropped");
                self.destroy(None);
            }
        }
    }

    async fn on_outbound(&mut self, outbound: Option<Outbound>) {
        match outbound {
            Some(Outbound::Write { chunk, ack }) => self.on_write(chunk, ack).await,
            Some(Outbound::End) => self.on_end(),
            None => self.outbound_open = false,
        }
    }

    async fn on_write(&mut self, chunk: Bytes, ack: WriteAck) {
        let write = PendingWrite::new(ack);
        if self.ending {
            debug!(len = chunk.len(), "write rejected after end");
            write.resolve(Err(StreamError::WriteAfterEnd));
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            write.resolve(Err(StreamError::StreamDestroyed));
            return;
        };
        if let Err(err) = transport.writer.feed(chunk).await {
            self.lifecycle.defer_write(write);
            self.on_transport_error(err);
            return;
        }
        let buffered = transport.writer.write_buffer().len();
        if buffered >= self.high_water_mark {
            debug!(buffered, "transport saturated; deferring acknowledgment");
            self.lifecycle.defer_write(write);
        } else {
            write.resolve(Ok(()));
        }
    }

    fn on_end(&mut self) {
        if self.ending {
            return;
        }
        debug!("local end requested");
        self.ending = true;
        self.closing = true;
    }

    async fn on_frame(&mut self, next: Option<io::Result<BytesMut>>) {
        match next {
            Some(Ok(frame)) if self.engine.state() == HandshakeState::Completed => {
                self.lifecycle.emit(StreamEvent::Data(frame.freeze()));
            }
            Some(Ok(frame)) => self.advance_handshake(&frame).await,
            Some(Err(err)) => self.on_transport_error(err),
            None => self.on_remote_end(),
        }
    }

    async fn advance_handshake(&mut self, frame: &[u8]) {
        match self.engine.on_frame(frame) {
            Ok(HandshakeStep::SendDigest(digest)) => self.send_frame(digest).await,
            Ok(HandshakeStep::Completed(outcome)) => {
                info!(remote = %outcome.remote_public_key, "stream opened");
                self.lifecycle.settle_open(Ok(outcome));
            }
            Err(err) => {
                self.lifecycle.settle_open(Err(err.clone()));
                self.destroy(Some(err));
            }
        }
    }

    async fn send_frame(&mut self, frame: Bytes) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(err) = transport.writer.feed(frame).await {
            self.on_transport_error(err);
        }
    }

    fn on_remote_end(&mut self) {
        if self.engine.state() != HandshakeState::Completed {
            warn!(state = ?self.engine.state(), "transport closed before handshake completed");
            self.destroy(Some(StreamError::TransportDestroyed));
            return;
        }
        self.lifecycle.end_read();
        if self.lifecycle.halves().fully_ended() {
            self.destroy(None);
        }
    }

    fn on_written(&mut self, result: io::Result<()>, closed: bool) {
        if let Err(err) = result {
            self.on_transport_error(err);
            return;
        }
        self.lifecycle.drained();
        if closed {
            self.closing = false;
            self.lifecycle.end_write();
            if self.lifecycle.halves().fully_ended() {
                self.destroy(None);
            }
        }
    }

    fn on_transport_error(&mut self, err: io::Error) {
        warn!(error = %err, "transport error");
        self.destroy(Some(err.into()));
    }

    /// Tear down the transport and settle every observer. Runs once.
    fn destroy(&mut self, reason: Option<StreamError>) {
        if !self.lifecycle.begin_destroy() {
            return;
        }
        self.transport = None;
        match &reason {
            Some(err) => debug!(reason = %err, "stream destroyed"),
            None => debug!("stream destroyed"),
        }
        self.lifecycle.finish_destroy(reason);
    }
}

async fn drive_writer<T>(writer: &mut FrameWriter<T>, closing: bool) -> io::Result<()>
where
    T: AsyncWrite,
{
    if closing {
        writer.close().await
    } else {
        writer.flush().await
    }
}
