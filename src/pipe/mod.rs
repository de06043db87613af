//! Runtime for the `nss-pipe` tool.
//!
//! The tool accepts or opens one TCP connection, runs the not-secret
//! handshake over it and then copies standard input to the stream and stream
//! frames to standard output until both sides have finished.

pub mod cli;

use std::io;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ortho_config::OrthoConfig;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use self::cli::{Endpoint, PipeConfig};
use crate::{
    error::{ConfigError, StreamError},
    stream::{NotSecretStream, StreamEvent},
};

const DEFAULT_LOG_FILTER: &str = "not_secret_stream=info";

/// Failures reported by the pipe.
#[derive(Debug, Error)]
pub enum PipeError {
    /// Neither or both of `--listen` and `--connect` were given.
    #[error("exactly one of --listen or --connect is required")]
    Endpoint,
    /// The configuration could not be turned into stream options.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Reading standard input failed.
    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),
    /// Writing standard output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    /// The stream failed or was destroyed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Load configuration from the process environment and run the pipe.
///
/// # Errors
///
/// Returns any error raised while loading configuration, establishing the
/// connection, completing the handshake or piping data.
pub async fn run() -> Result<()> {
    init_tracing();
    let config = PipeConfig::load_from_iter(std::env::args_os())?;
    run_with_config(config).await
}

/// Run the pipe using an already loaded [`PipeConfig`].
///
/// # Errors
///
/// Propagates connection, handshake and piping failures.
pub async fn run_with_config(config: PipeConfig) -> Result<()> {
    let stream_config = config.stream_config()?;
    let socket = match config.endpoint()? {
        Endpoint::Listen(addr) => accept_one(&addr).await?,
        Endpoint::Connect(addr) => TcpStream::connect(&addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?,
    };
    let peer = socket.peer_addr()?;
    let stream = NotSecretStream::new(socket, &stream_config);
    info!(%peer, local = %stream.public_key(), "handshake started");
    stream.open().await.context("handshake failed")?;
    if let Some(remote) = stream.remote_public_key() {
        info!(%peer, %remote, "connected");
    }
    pipe(stream, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}

async fn accept_one(addr: &str) -> Result<TcpStream> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "waiting for peer");
    let (socket, peer) = listener.accept().await?;
    debug!(%peer, "accepted connection");
    Ok(socket)
}

/// Copy `source` to `stream` and stream frames to `output`.
///
/// Input end finishes the local side of the stream. Returns once the stream
/// closes; frame boundaries are not preserved on `output`.
///
/// # Errors
///
/// Returns [`PipeError`] when either side of the copy fails or the stream is
/// destroyed with an error.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! macro usage"
)]
pub async fn pipe<R, W>(
    mut stream: NotSecretStream,
    source: R,
    mut output: W,
) -> Result<(), PipeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut input = FramedRead::new(source, BytesCodec::new());
    let mut input_open = true;
    loop {
        tokio::select! {
            read = input.next(), if input_open => match read {
                Some(Ok(chunk)) => stream.write(chunk.freeze()).await?,
                Some(Err(err)) => return Err(PipeError::Input(err)),
                None => {
                    debug!("input finished");
                    input_open = false;
                    stream.end();
                }
            },
            event = stream.next() => match event {
                Some(StreamEvent::Data(frame)) => {
                    output.write_all(&frame).await.map_err(PipeError::Output)?;
                    output.flush().await.map_err(PipeError::Output)?;
                }
                Some(StreamEvent::End) => debug!("peer finished"),
                Some(StreamEvent::Drain) => {}
                Some(StreamEvent::Error(err)) => return Err(err.into()),
                Some(StreamEvent::Close) | None => break,
            },
        }
    }
    output.flush().await.map_err(PipeError::Output)
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests;
