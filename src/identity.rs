//! Identity material exchanged during the not-secret handshake.
//!
//! A peer is identified by a fixed 32-byte public key. Both peers derive the
//! same 64-byte [`HandshakeDigest`] by ordering the two keys with an unsigned
//! byte comparison and concatenating them. Nothing here is cryptographically
//! binding; the shapes only match the secure variant so the two streams stay
//! interchangeable.

use std::{fmt, str::FromStr};

use rand::{RngCore, rngs::OsRng};

use crate::error::ConfigError;

/// Length in bytes of a [`PublicKey`].
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length in bytes of a [`HandshakeDigest`].
pub const DIGEST_LEN: usize = 2 * PUBLIC_KEY_LEN;

/// Fixed-length public key identifying one side of a stream.
///
/// Ordering is lexicographic over the raw bytes, which is the unsigned byte
/// comparison used to build the digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self { Self(bytes) }

    /// Generate a fresh random key from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode a key from a frame payload.
    ///
    /// Returns `None` unless `bytes` is exactly [`PUBLIC_KEY_LEN`] long.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        <[u8; PUBLIC_KEY_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] { &self.0 }
}

impl From<[u8; PUBLIC_KEY_LEN]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LEN]) -> Self { Self(bytes) }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&hex::encode(self.0)) }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|err| ConfigError::InvalidPublicKey(err.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Caller-supplied key material.
///
/// Only the public half is meaningful; there is no key agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPair {
    /// Public key announced to the remote peer.
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Build a key pair around an existing public key.
    #[must_use]
    pub const fn new(public_key: PublicKey) -> Self { Self { public_key } }

    /// Generate a key pair with a random public key.
    #[must_use]
    pub fn generate() -> Self { Self::new(PublicKey::generate()) }
}

/// Consistency digest both peers compute after exchanging keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandshakeDigest([u8; DIGEST_LEN]);

impl HandshakeDigest {
    /// Compute the digest for two keys: the lower key followed by the higher.
    ///
    /// The result does not depend on which key is local.
    #[must_use]
    pub fn compute(local: &PublicKey, remote: &PublicKey) -> Self {
        let (lower, higher) = if local <= remote {
            (local, remote)
        } else {
            (remote, local)
        };
        let mut bytes = [0u8; DIGEST_LEN];
        let (head, tail) = bytes.split_at_mut(PUBLIC_KEY_LEN);
        head.copy_from_slice(lower.as_bytes());
        tail.copy_from_slice(higher.as_bytes());
        Self(bytes)
    }

    /// Decode a digest from a frame payload.
    ///
    /// Returns `None` unless `bytes` is exactly [`DIGEST_LEN`] long.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        <[u8; DIGEST_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Borrow the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] { &self.0 }
}

impl Default for HandshakeDigest {
    fn default() -> Self { Self([0u8; DIGEST_LEN]) }
}

impl AsRef<[u8]> for HandshakeDigest {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl fmt::Debug for HandshakeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandshakeDigest({})", hex::encode(self.0))
    }
}
