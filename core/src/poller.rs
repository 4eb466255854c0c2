//! Bounded fixed-interval polling against the rendezvous store.

use crate::correlation::CorrelationId;
use crate::error::StoreError;
use crate::store::ResultStore;
use std::time::Duration;

/// How long and how often to poll.
///
/// Fixed-interval polling (not exponential backoff) is deliberate: the
/// producer→consumer→store latency is expected to be small and bounded, and
/// `interval × max_attempts` is the end-to-end wait budget operators tune for
/// their consumer's processing time. Neither value is ever hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between attempts.
    pub interval: Duration,
    /// Maximum number of store lookups before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Build a policy.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// The worst-case added latency: `interval × max_attempts`.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// The three possible endings of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The consumer wrote a value under the correlation key.
    Found(String),
    /// The budget elapsed without a value appearing. A soft outcome: the
    /// consumer may simply not have finished.
    NotFound,
    /// The store itself failed; distinct from absence and fatal to the poll.
    StoreError(StoreError),
}

/// Poll the store at the correlation key until a value appears, the store
/// fails, or the attempt budget runs out.
///
/// Each iteration sleeps `interval` (suspending only this task), then issues
/// exactly one bounded `get`. A present value returns immediately; a store
/// failure returns immediately and is never retried as if it were absence;
/// exhaustion returns [`PollOutcome::NotFound`] after exactly
/// `max_attempts` lookups.
///
/// Cancellation: the sleep and the get are the loop's await points, so
/// dropping the caller's future abandons the loop promptly between
/// iterations.
pub async fn await_result(
    store: &dyn ResultStore,
    key: CorrelationId,
    policy: PollPolicy,
) -> PollOutcome {
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        match store.get(key).await {
            Ok(Some(value)) => {
                tracing::debug!(
                    correlation_id = %key,
                    attempt,
                    "result found in rendezvous store"
                );
                metrics::counter!("relay.poll.found").increment(1);
                return PollOutcome::Found(value);
            }
            Ok(None) => {
                tracing::trace!(correlation_id = %key, attempt, "result not yet present");
            }
            Err(error) => {
                tracing::warn!(
                    correlation_id = %key,
                    attempt,
                    error = %error,
                    "rendezvous store lookup failed"
                );
                metrics::counter!("relay.poll.store_errors").increment(1);
                return PollOutcome::StoreError(error);
            }
        }
    }

    tracing::debug!(
        correlation_id = %key,
        attempts = policy.max_attempts,
        "poll budget exhausted without a result"
    );
    metrics::counter!("relay.poll.not_found").increment(1);
    PollOutcome::NotFound
}
