//! Utilities for integration tests.
//!
//! The `test-util` crate provides in-memory transports, a drop-counting
//! transport wrapper and a scripted raw peer that speaks the framed wire
//! protocol directly. It is used by integration tests in the main crate.

mod peer;
mod transport;

use std::time::Duration;

use not_secret_stream::{NotSecretStream, StreamConfig, StreamEvent};

pub use crate::{
    peer::RawPeer,
    transport::{CountingTransport, DropCounter, transport_pair},
};

/// Upper bound for any single awaited step in a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the in-memory pipes used by [`stream_pair`].
pub const PAIR_CAPACITY: usize = 64 * 1024;

/// Two streams connected over an in-memory duplex pipe, each with a fresh
/// generated key.
#[must_use]
pub fn stream_pair() -> (NotSecretStream, NotSecretStream) {
    stream_pair_with(&StreamConfig::default(), &StreamConfig::default())
}

/// Like [`stream_pair`] with explicit configuration for each side.
#[must_use]
pub fn stream_pair_with(
    left: &StreamConfig,
    right: &StreamConfig,
) -> (NotSecretStream, NotSecretStream) {
    let (left_raw, right_raw) = transport_pair(PAIR_CAPACITY);
    (
        NotSecretStream::new(left_raw, left),
        NotSecretStream::new(right_raw, right),
    )
}

/// Collect events until [`StreamEvent::Close`] or the end of the event queue.
///
/// The close event, when seen, is the last element.
pub async fn events_until_close(stream: &mut NotSecretStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        let closed = matches!(event, StreamEvent::Close);
        events.push(event);
        if closed {
            break;
        }
    }
    events
}
