//! Correlation id generation.
//!
//! A correlation id links a published message to the result an out-of-process
//! consumer eventually writes to the rendezvous store. It is minted once per
//! inbound request, used as both the broker message key and the store lookup
//! key, and never reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, globally-unique request identifier.
///
/// Backed by a random (v4) UUID: 122 bits of entropy, so collision over a
/// process lifetime is negligible. Two concurrent requests never share an id;
/// a collision would be a correctness bug, not a performance problem, because
/// both requests would rendezvous on the same store key.
///
/// The `Display` form (canonical hyphenated UUID) is the exact string used as
/// the broker record key and the store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Mint a fresh correlation id.
    ///
    /// Pure id generation: no I/O, no shared state.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
