//! Shared helpers for unit tests.

pub(crate) mod tracing;

use crate::identity::{PUBLIC_KEY_LEN, PublicKey};

/// Build a key whose bytes are all `fill`, which keeps digest ordering
/// predictable in assertions.
pub(crate) const fn key(fill: u8) -> PublicKey { PublicKey::from_bytes([fill; PUBLIC_KEY_LEN]) }
