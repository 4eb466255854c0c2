//! The per-request control flow: id → publish → poll → outcome.

use crate::correlation::CorrelationId;
use crate::envelope::RequestEnvelope;
use crate::error::RelayError;
use crate::poller::{self, PollOutcome, PollPolicy};
use crate::propagation::{Propagator, TraceContext};
use crate::publisher::{DeliveryHandle, PublishAck, RequestPublisher};
use crate::store::ResultStore;
use std::sync::Arc;

/// What one relayed request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// The id minted for this request; clients can correlate logs and traces
    /// on both sides of the broker with it.
    pub correlation_id: CorrelationId,
    /// The consumer's result, or `None` if it had not appeared before the
    /// poll deadline. Absence is a reported soft condition, not a failure.
    pub result: Option<String>,
}

/// Ties the correlation tracker, publisher, poller and propagator together
/// for one inbound request at a time.
///
/// One orchestrator serves all requests concurrently: it holds only shared
/// handles (`Arc`s to the publisher, store and propagator), and each
/// [`handle`](Self::handle) call is an independent task with its own
/// correlation id. The propagator and poll policy are injected here rather
/// than read from any global, so swapping the tracing vendor or tuning the
/// poll budget never touches this code.
pub struct Orchestrator {
    publisher: Arc<dyn RequestPublisher>,
    store: Arc<dyn ResultStore>,
    propagator: Arc<dyn Propagator>,
    policy: PollPolicy,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn RequestPublisher>,
        store: Arc<dyn ResultStore>,
        propagator: Arc<dyn Propagator>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            publisher,
            store,
            propagator,
            policy,
        }
    }

    /// The propagator in use, for extracting inbound trace context at the
    /// transport edge with the same format that is injected on publish.
    #[must_use]
    pub fn propagator(&self) -> &Arc<dyn Propagator> {
        &self.propagator
    }

    /// Relay one payload: mint an id, publish, poll, report.
    ///
    /// `parent` is the trace context extracted from the inbound request, if
    /// it carried one; the envelope gets a child of it (or a fresh root) so
    /// the consumer's spans join the caller's trace.
    ///
    /// # Errors
    ///
    /// [`RelayError::Publish`] if the envelope never reached the broker — in
    /// that case the store is never polled, because no consumer will ever
    /// write the key. [`RelayError::Store`] if polling hit a store-level
    /// failure. A result that simply never appeared is **not** an error; it
    /// comes back as `Ok` with `result: None`.
    pub async fn handle(
        &self,
        payload: String,
        parent: Option<&TraceContext>,
    ) -> Result<RelayOutcome, RelayError> {
        let correlation_id = CorrelationId::new();
        tracing::info!(correlation_id = %correlation_id, "relaying request");
        metrics::counter!("relay.requests").increment(1);

        let context = parent.map_or_else(TraceContext::root, TraceContext::child);
        let mut envelope = RequestEnvelope::new(correlation_id, payload);
        self.propagator.inject(&context, &mut envelope.trace_headers);

        let ack = self.publisher.publish(envelope).await.inspect_err(|error| {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %error,
                "publish failed; not polling"
            );
            metrics::counter!("relay.publish.failures").increment(1);
        })?;

        let outcome = match ack {
            PublishAck::Confirmed => {
                poller::await_result(self.store.as_ref(), correlation_id, self.policy).await
            }
            PublishAck::Pending(handle) => {
                self.poll_racing_delivery(correlation_id, handle).await?
            }
        };

        match outcome {
            PollOutcome::Found(value) => {
                tracing::info!(correlation_id = %correlation_id, "request completed with result");
                Ok(RelayOutcome {
                    correlation_id,
                    result: Some(value),
                })
            }
            PollOutcome::NotFound => {
                tracing::info!(
                    correlation_id = %correlation_id,
                    "no result before the poll deadline"
                );
                Ok(RelayOutcome {
                    correlation_id,
                    result: None,
                })
            }
            PollOutcome::StoreError(error) => {
                tracing::error!(
                    correlation_id = %correlation_id,
                    error = %error,
                    "rendezvous store failed during polling"
                );
                Err(error.into())
            }
        }
    }

    /// Poll while watching the asynchronous delivery report.
    ///
    /// Fire-and-forget publishes report failure after the fact; if that
    /// failure arrives before the poll deadline it is surfaced as a publish
    /// error instead of letting the poll run to a guaranteed timeout.
    async fn poll_racing_delivery(
        &self,
        correlation_id: CorrelationId,
        mut handle: DeliveryHandle,
    ) -> Result<PollOutcome, RelayError> {
        let poll = poller::await_result(self.store.as_ref(), correlation_id, self.policy);
        tokio::pin!(poll);
        let mut delivery_pending = true;

        loop {
            tokio::select! {
                outcome = &mut poll => return Ok(outcome),
                report = &mut handle, if delivery_pending => {
                    delivery_pending = false;
                    if let Err(error) = report {
                        tracing::error!(
                            correlation_id = %correlation_id,
                            error = %error,
                            "asynchronous delivery report failed; abandoning poll"
                        );
                        metrics::counter!("relay.publish.failures").increment(1);
                        return Err(RelayError::Publish(error));
                    }
                    tracing::debug!(correlation_id = %correlation_id, "delivery confirmed");
                }
            }
        }
    }
}
