//! Tests for the handshake state machine.

use rstest::{fixture, rstest};
use tracing::Level;

use super::*;
use crate::test_helpers::{key, tracing::capture_single_event};

#[fixture]
fn engine() -> HandshakeEngine { HandshakeEngine::new(key(2)) }

fn digest_frame(engine: &mut HandshakeEngine, remote: PublicKey) -> Bytes {
    match engine.on_frame(remote.as_bytes()) {
        Ok(HandshakeStep::SendDigest(frame)) => frame,
        other => panic!("expected digest frame, got {other:?}"),
    }
}

#[rstest]
fn hello_carries_local_key(engine: HandshakeEngine) {
    assert_eq!(&engine.hello()[..], key(2).as_bytes());
    assert_eq!(engine.state(), HandshakeState::AwaitingRemoteKey);
    assert_eq!(engine.digest(), HandshakeDigest::default());
}

#[rstest]
fn remote_key_produces_ordered_digest(mut engine: HandshakeEngine) {
    let frame = digest_frame(&mut engine, key(1));

    assert_eq!(engine.state(), HandshakeState::AwaitingRemoteDigest);
    assert_eq!(engine.remote_public_key(), Some(key(1)));
    assert_eq!(&frame[..PUBLIC_KEY_LEN], key(1).as_bytes());
    assert_eq!(&frame[PUBLIC_KEY_LEN..], key(2).as_bytes());
}

#[rstest]
fn matching_digest_completes(mut engine: HandshakeEngine) {
    let frame = digest_frame(&mut engine, key(7));

    let step = engine.on_frame(&frame).expect("digest should match");

    assert_eq!(
        step,
        HandshakeStep::Completed(HandshakeOutcome {
            remote_public_key: key(7),
            digest: HandshakeDigest::compute(&key(2), &key(7)),
        })
    );
    assert_eq!(engine.state(), HandshakeState::Completed);
}

#[rstest]
fn two_engines_agree() {
    let mut left = HandshakeEngine::new(PublicKey::generate());
    let mut right = HandshakeEngine::new(PublicKey::generate());

    let left_digest = match left.on_frame(&right.hello()) {
        Ok(HandshakeStep::SendDigest(frame)) => frame,
        other => panic!("left: {other:?}"),
    };
    let right_digest = match right.on_frame(&left.hello()) {
        Ok(HandshakeStep::SendDigest(frame)) => frame,
        other => panic!("right: {other:?}"),
    };
    assert_eq!(left_digest, right_digest);

    assert!(matches!(
        left.on_frame(&right_digest),
        Ok(HandshakeStep::Completed(_))
    ));
    assert!(matches!(
        right.on_frame(&left_digest),
        Ok(HandshakeStep::Completed(_))
    ));
    assert_eq!(left.remote_public_key(), Some(right.public_key()));
    assert_eq!(right.remote_public_key(), Some(left.public_key()));
}

#[rstest]
fn mismatched_digest_fails(mut engine: HandshakeEngine) {
    digest_frame(&mut engine, key(1));

    let (result, event) = capture_single_event(|| engine.on_frame(&[0xee; DIGEST_LEN]));

    assert!(matches!(result, Err(StreamError::HandshakeMismatch)));
    assert_eq!(engine.state(), HandshakeState::Failed);
    assert_eq!(event.level(), Level::WARN);
    assert_eq!(event.field("error"), Some("handshake failed"));
}

#[rstest]
#[case::completed(true)]
#[case::failed(false)]
fn frames_after_conclusion_are_unreachable(mut engine: HandshakeEngine, #[case] complete: bool) {
    let frame = digest_frame(&mut engine, key(3));
    let reply = if complete {
        frame.to_vec()
    } else {
        vec![0u8; DIGEST_LEN]
    };
    let _conclusion = engine.on_frame(&reply);
    let concluded = engine.state();
    assert!(concluded.is_terminal());

    let (result, event) = capture_single_event(|| engine.on_frame(b"late"));

    assert!(matches!(result, Err(StreamError::UnreachableState)));
    assert_eq!(engine.state(), concluded);
    assert_eq!(event.level(), Level::WARN);
    assert_eq!(
        event.message(),
        Some("frame received after handshake concluded")
    );
}

#[rstest]
#[case::short_key(&[1u8; 31][..], HandshakeFrame::PublicKey, PUBLIC_KEY_LEN)]
#[case::long_key(&[1u8; 64][..], HandshakeFrame::PublicKey, PUBLIC_KEY_LEN)]
fn rejects_malformed_key_frame(
    mut engine: HandshakeEngine,
    #[case] frame: &[u8],
    #[case] kind: HandshakeFrame,
    #[case] expected: usize,
) {
    let err = engine.on_frame(frame).expect_err("malformed frame");

    match err {
        StreamError::InvalidFrame {
            kind: got,
            expected: want,
            actual,
        } => {
            assert_eq!(got, kind);
            assert_eq!(want, expected);
            assert_eq!(actual, frame.len());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(engine.state(), HandshakeState::Failed);
}

#[rstest]
fn rejects_malformed_digest_frame(mut engine: HandshakeEngine) {
    digest_frame(&mut engine, key(1));

    let err = engine.on_frame(&[0u8; 32]).expect_err("short digest");

    assert!(matches!(
        err,
        StreamError::InvalidFrame {
            kind: HandshakeFrame::Digest,
            expected: DIGEST_LEN,
            actual: 32,
        }
    ));
    assert_eq!(engine.state(), HandshakeState::Failed);
}

#[rstest]
fn remote_key_is_logged(mut engine: HandshakeEngine) {
    let (_, event) = capture_single_event(|| engine.on_frame(key(5).as_bytes()));

    assert_eq!(event.level(), Level::DEBUG);
    assert_eq!(event.field("remote"), Some(key(5).to_string().as_str()));
}
