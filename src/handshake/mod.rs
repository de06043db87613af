//! One-shot handshake state machine.
//!
//! The engine is sans-IO: the stream driver feeds it received frames and
//! writes whatever it asks to send. Each side announces its public key in the
//! first frame, answers the remote key with the [`HandshakeDigest`] in the
//! second, and completes once the remote digest matches its own.
//!
//! The state only moves forward:
//! `AwaitingRemoteKey -> AwaitingRemoteDigest -> Completed | Failed`.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    error::{HandshakeFrame, StreamError},
    identity::{DIGEST_LEN, HandshakeDigest, PUBLIC_KEY_LEN, PublicKey},
};

/// Progress of the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the remote public key frame.
    AwaitingRemoteKey,
    /// Local digest sent; waiting for the remote digest frame.
    AwaitingRemoteDigest,
    /// Digests matched; pass-through may begin.
    Completed,
    /// The handshake failed and will never complete.
    Failed,
}

impl HandshakeState {
    /// Returns `true` once the handshake has concluded either way.
    #[must_use]
    pub const fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

/// Identity material agreed by a completed handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// Public key announced by the remote peer.
    pub remote_public_key: PublicKey,
    /// Digest both peers computed.
    pub digest: HandshakeDigest,
}

/// What the driver must do after feeding a frame to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeStep {
    /// Send this frame (the local digest) to the remote peer.
    SendDigest(Bytes),
    /// The handshake completed; switch to pass-through.
    Completed(HandshakeOutcome),
}

/// Handshake engine for a single stream.
#[derive(Debug)]
pub struct HandshakeEngine {
    local: PublicKey,
    remote: Option<PublicKey>,
    digest: HandshakeDigest,
    state: HandshakeState,
}

impl HandshakeEngine {
    /// Create an engine announcing `local`.
    #[must_use]
    pub fn new(local: PublicKey) -> Self {
        Self {
            local,
            remote: None,
            digest: HandshakeDigest::default(),
            state: HandshakeState::AwaitingRemoteKey,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState { self.state }

    /// Local public key.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey { self.local }

    /// Remote public key, once its frame has been received.
    #[must_use]
    pub const fn remote_public_key(&self) -> Option<PublicKey> { self.remote }

    /// Local digest; all zeroes until the remote key is known.
    #[must_use]
    pub const fn digest(&self) -> HandshakeDigest { self.digest }

    /// The first frame to send: the local public key.
    #[must_use]
    pub fn hello(&self) -> Bytes { Bytes::copy_from_slice(self.local.as_bytes()) }

    /// Feed one received frame to the engine.
    ///
    /// # Errors
    /// - [`StreamError::InvalidFrame`] when a handshake frame has the wrong
    ///   length.
    /// - [`StreamError::HandshakeMismatch`] when the remote digest differs
    ///   from the local one.
    /// - [`StreamError::UnreachableState`] when called after the handshake
    ///   has concluded.
    ///
    /// The first two move the engine to [`HandshakeState::Failed`]; the last
    /// leaves the state untouched.
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<HandshakeStep, StreamError> {
        match self.state {
            HandshakeState::AwaitingRemoteKey => self.on_remote_key(frame),
            HandshakeState::AwaitingRemoteDigest => self.on_remote_digest(frame),
            HandshakeState::Completed | HandshakeState::Failed => {
                warn!(state = ?self.state, len = frame.len(), "frame received after handshake concluded");
                Err(StreamError::UnreachableState)
            }
        }
    }

    fn on_remote_key(&mut self, frame: &[u8]) -> Result<HandshakeStep, StreamError> {
        let Some(remote) = PublicKey::decode(frame) else {
            return Err(self.fail(StreamError::InvalidFrame {
                kind: HandshakeFrame::PublicKey,
                expected: PUBLIC_KEY_LEN,
                actual: frame.len(),
            }));
        };
        self.remote = Some(remote);
        self.digest = HandshakeDigest::compute(&self.local, &remote);
        self.state = HandshakeState::AwaitingRemoteDigest;
        debug!(remote = %remote, "remote public key received");
        Ok(HandshakeStep::SendDigest(Bytes::copy_from_slice(
            self.digest.as_bytes(),
        )))
    }

    fn on_remote_digest(&mut self, frame: &[u8]) -> Result<HandshakeStep, StreamError> {
        let Some(remote_digest) = HandshakeDigest::decode(frame) else {
            return Err(self.fail(StreamError::InvalidFrame {
                kind: HandshakeFrame::Digest,
                expected: DIGEST_LEN,
                actual: frame.len(),
            }));
        };
        let Some(remote) = self.remote else {
            return Err(self.fail(StreamError::UnreachableState));
        };
        if remote_digest != self.digest {
            return Err(self.fail(StreamError::HandshakeMismatch));
        }
        self.state = HandshakeState::Completed;
        debug!(remote = %remote, "handshake digest verified");
        Ok(HandshakeStep::Completed(HandshakeOutcome {
            remote_public_key: remote,
            digest: self.digest,
        }))
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        self.state = HandshakeState::Failed;
        warn!(error = %err, "handshake failed");
        err
    }
}

#[cfg(test)]
mod tests;
