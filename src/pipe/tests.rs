//! Tests for the stdio pipe loop.

use std::time::Duration;

use bytes::Bytes;
use rstest::rstest;
use tokio::time::timeout;

use super::*;
use crate::config::StreamConfig;

const LIMIT: Duration = Duration::from_secs(5);

fn stream_pair() -> (NotSecretStream, NotSecretStream) {
    let (left, right) = tokio::io::duplex(64 * 1024);
    (
        NotSecretStream::new(left, &StreamConfig::default()),
        NotSecretStream::new(right, &StreamConfig::default()),
    )
}

async fn next_data(stream: &mut NotSecretStream) -> Option<Bytes> {
    loop {
        match stream.recv().await? {
            StreamEvent::Data(frame) => return Some(frame),
            StreamEvent::Drain => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[rstest]
#[tokio::test]
async fn pipes_both_directions_until_close() {
    let (local, mut remote) = stream_pair();

    let peer = tokio::spawn(async move {
        let frame = next_data(&mut remote).await.expect("input frame");
        assert_eq!(&frame[..], b"ping");
        assert!(matches!(remote.recv().await, Some(StreamEvent::End)));
        remote.write("pong").await.expect("reply");
        remote.end();
        while let Some(event) = remote.recv().await {
            if matches!(event, StreamEvent::Close) {
                break;
            }
        }
    });

    let mut output = Vec::new();
    timeout(LIMIT, pipe(local, &b"ping"[..], &mut output))
        .await
        .expect("pipe timed out")
        .expect("pipe should succeed");
    timeout(LIMIT, peer)
        .await
        .expect("peer timed out")
        .expect("peer task");

    assert_eq!(output, b"pong");
}

#[rstest]
#[tokio::test]
async fn destroy_reason_is_reported() {
    let (local, remote) = stream_pair();
    remote.open().await.expect("remote open");
    local.destroyer().destroy(Some(StreamError::custom("operator abort")));

    let mut output = Vec::new();
    let err = timeout(LIMIT, pipe(local, tokio::io::empty(), &mut output))
        .await
        .expect("pipe timed out")
        .expect_err("pipe should fail");

    assert_eq!(err.to_string(), "operator abort");
    assert!(output.is_empty());
    drop(remote);
}
