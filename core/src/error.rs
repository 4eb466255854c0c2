//! Error taxonomy shared across the publisher and store ports.
//!
//! The split matters to callers: a [`PublishError`] means no consumer will
//! ever populate the rendezvous key, so the request fails immediately without
//! polling. A [`StoreError`] means the store itself is unhealthy, which is a
//! different outcome from "the consumer has not written yet" (that soft case
//! is [`PollOutcome::NotFound`](crate::poller::PollOutcome::NotFound), not an
//! error at all).

use std::time::Duration;
use thiserror::Error;

/// Failure to hand a request envelope to the broker.
///
/// Fatal to the request: the orchestrator never polls after a publish
/// failure. Retrying is the caller's decision, not the core's.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The broker rejected the send or could not be reached.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// No acknowledgement within the configured publish timeout.
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    /// The envelope could not be serialized to the wire format.
    #[error("failed to serialize envelope: {0}")]
    Serialization(String),
}

/// Failure at the rendezvous store, distinct from key absence.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Could not open or use a store connection.
    #[error("store connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// A single store operation exceeded its per-operation timeout.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// No pooled connection became available within the acquire timeout.
    ///
    /// Surfaced as a failure rather than creating connections past the pool
    /// bound, which would overload the shared store.
    #[error("connection pool exhausted after waiting {waited:?}")]
    PoolExhausted {
        /// How long the acquirer waited before giving up.
        waited: Duration,
    },
}

/// Request-level failure reported by the orchestrator.
///
/// `NotFound` is deliberately absent: a missing result is a successful
/// response carrying an explicit absence marker, never an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The publish step failed; the poll loop was never entered.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The poll loop hit a store-level failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_timeout_display_names_the_bound() {
        let err = PublishError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn relay_error_is_transparent() {
        let err = RelayError::from(StoreError::ConnectionUnavailable("refused".into()));
        assert_eq!(err.to_string(), "store connection unavailable: refused");
    }
}
