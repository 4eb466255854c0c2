//! The broker publisher port.

use crate::envelope::RequestEnvelope;
use crate::error::PublishError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// What a successful `publish` call means.
///
/// Whether the publisher waits for the broker acknowledgement or enqueues and
/// returns is a configuration flag on the implementation, not a separate code
/// path for callers: both shapes arrive through this one type.
#[derive(Debug)]
pub enum PublishAck {
    /// The broker acknowledged the record within the publish timeout.
    Confirmed,
    /// Fire-and-forget: the record was enqueued and the delivery report will
    /// arrive asynchronously through the handle.
    Pending(DeliveryHandle),
}

/// Sender half of an asynchronous delivery report.
///
/// Handed to the publisher's background send task; completing it resolves the
/// matching [`DeliveryHandle`].
#[derive(Debug)]
pub struct DeliveryReport {
    tx: oneshot::Sender<Result<(), PublishError>>,
}

impl DeliveryReport {
    /// Report the delivery outcome. Dropping the report without calling this
    /// resolves the handle as a broker failure.
    pub fn complete(self, outcome: Result<(), PublishError>) {
        // The orchestrator may already have found a result and moved on.
        let _ = self.tx.send(outcome);
    }
}

/// Receiver half of an asynchronous delivery report.
///
/// A future resolving to the delivery outcome. The orchestrator races it
/// against the poll loop so a send failure surfaces before the poll deadline
/// instead of silently guaranteeing a timeout.
#[derive(Debug)]
pub struct DeliveryHandle {
    rx: oneshot::Receiver<Result<(), PublishError>>,
}

impl DeliveryHandle {
    /// A connected report/handle pair.
    #[must_use]
    pub fn channel() -> (DeliveryReport, Self) {
        let (tx, rx) = oneshot::channel();
        (DeliveryReport { tx }, Self { rx })
    }
}

impl Future for DeliveryHandle {
    type Output = Result<(), PublishError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            // The send task dropped its report without completing it.
            Err(_) => Err(PublishError::BrokerUnavailable(
                "delivery report dropped before completion".to_string(),
            )),
        })
    }
}

/// Port for handing a request envelope to the message broker.
///
/// Implementations serialize the envelope's wire body, attach its trace
/// headers as record headers, key the record by the correlation id so any
/// consumer instance can be addressed uniformly, and send. They never write
/// to the rendezvous store.
///
/// # Dyn compatibility
///
/// Explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// orchestrator can hold `Arc<dyn RequestPublisher>`.
pub trait RequestPublisher: Send + Sync {
    /// Send one envelope.
    ///
    /// The envelope is taken by value: the publisher owns it for the duration
    /// of the send call.
    ///
    /// # Errors
    ///
    /// [`PublishError`] on serialization failure, broker rejection or
    /// acknowledgement timeout. A failed publish means no consumer will ever
    /// populate the rendezvous key, so callers must not poll after one.
    fn publish(
        &self,
        envelope: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, PublishError>> + Send + '_>>;
}
