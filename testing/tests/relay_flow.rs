//! End-to-end relay flow tests against mock transports.
//!
//! All timing tests run under paused tokio time, so the poll budget
//! assertions are exact and the suite finishes in milliseconds.

#![allow(clippy::unwrap_used)]

use relay_core::{
    Orchestrator, PollPolicy, PropagationFormat, PublishError, RelayError, StoreError,
    TraceContext,
};
use relay_testing::{InMemoryResultStore, MockPublisher, ScriptedStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn orchestrator(
    publisher: Arc<MockPublisher>,
    store: Arc<dyn relay_core::ResultStore>,
    policy: PollPolicy,
) -> Orchestrator {
    relay_testing::init_tracing();
    Orchestrator::new(publisher, store, PropagationFormat::W3c.propagator(), policy)
}

#[tokio::test(start_paused = true)]
async fn absent_result_exhausts_exactly_the_poll_budget() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(ScriptedStore::never());
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = orchestrator(publisher.clone(), store.clone(), policy);

    let started = Instant::now();
    let outcome = gateway.handle("hello".to_string(), None).await.unwrap();

    assert_eq!(outcome.result, None);
    assert_eq!(store.get_count(), 10);
    assert_eq!(started.elapsed(), policy.budget());
}

#[tokio::test(start_paused = true)]
async fn result_on_attempt_k_stops_after_k_lookups() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(ScriptedStore::found_on_attempt(3, "42"));
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = orchestrator(publisher.clone(), store.clone(), policy);

    let started = Instant::now();
    let outcome = gateway.handle("hello".to_string(), None).await.unwrap();

    assert_eq!(outcome.result, Some("42".to_string()));
    assert_eq!(store.get_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn store_failure_aborts_the_poll_immediately() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(ScriptedStore::failing_on_attempt(
        1,
        StoreError::ConnectionUnavailable("down".to_string()),
    ));
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = orchestrator(publisher.clone(), store.clone(), policy);

    let result = gateway.handle("hello".to_string(), None).await;

    assert!(matches!(result, Err(RelayError::Store(_))));
    assert_eq!(store.get_count(), 1, "store failure must not be retried");
}

#[tokio::test(start_paused = true)]
async fn publish_failure_never_polls() {
    let publisher = Arc::new(MockPublisher::failing(PublishError::BrokerUnavailable(
        "no brokers".to_string(),
    )));
    let store = Arc::new(ScriptedStore::never());
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = orchestrator(publisher.clone(), store.clone(), policy);

    let started = Instant::now();
    let result = gateway.handle("hello".to_string(), None).await;

    assert!(matches!(result, Err(RelayError::Publish(_))));
    assert_eq!(publisher.publish_count(), 1);
    assert_eq!(store.get_count(), 0, "nothing to poll for after a failed publish");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn late_delivery_failure_aborts_a_running_poll() {
    let publisher = Arc::new(MockPublisher::pending());
    let store = Arc::new(ScriptedStore::never());
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = Arc::new(orchestrator(publisher.clone(), store.clone(), policy));

    let task = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        async move { gateway.handle("hello".to_string(), None).await }
    });

    // Let the poll start, then report the asynchronous delivery failure.
    tokio::time::sleep(Duration::from_millis(120)).await;
    publisher.complete_next_delivery(Err(PublishError::Timeout(Duration::from_secs(5))));

    let result = task.await.unwrap();
    assert!(matches!(result, Err(RelayError::Publish(PublishError::Timeout(_)))));
    assert!(store.get_count() < policy.max_attempts, "poll should stop early");
}

#[tokio::test(start_paused = true)]
async fn confirmed_late_delivery_lets_the_poll_finish() {
    let publisher = Arc::new(MockPublisher::pending());
    let store = Arc::new(ScriptedStore::found_on_attempt(4, "ok"));
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = Arc::new(orchestrator(publisher.clone(), store.clone(), policy));

    let task = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        async move { gateway.handle("hello".to_string(), None).await }
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    publisher.complete_next_delivery(Ok(()));

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome.result, Some("ok".to_string()));
    assert_eq!(store.get_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn envelope_carries_the_caller_trace() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(ScriptedStore::found_on_attempt(1, "v"));
    let policy = PollPolicy::new(Duration::from_millis(10), 3);
    let gateway = orchestrator(publisher.clone(), store, policy);

    let parent = TraceContext::root();
    gateway
        .handle("hello".to_string(), Some(&parent))
        .await
        .unwrap();

    let envelope = publisher.last_envelope().unwrap();
    let traceparent = envelope.trace_headers.get("traceparent").unwrap();
    assert!(
        traceparent.contains(&format!("{:032x}", parent.trace_id)),
        "consumer-side spans must join the caller's trace"
    );
    assert_eq!(envelope.payload, "hello");
}

#[tokio::test(start_paused = true)]
async fn consumer_writing_mid_poll_completes_the_rendezvous() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(InMemoryResultStore::new());
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = Arc::new(orchestrator(publisher.clone(), store.clone(), policy));

    // Stand-in consumer: pick up the published envelope, "process" for a
    // while, write the result under the correlation key.
    let consumer = tokio::spawn({
        let publisher = Arc::clone(&publisher);
        let store = Arc::clone(&store);
        async move {
            let envelope = loop {
                if let Some(envelope) = publisher.last_envelope() {
                    break envelope;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            };
            tokio::time::sleep(Duration::from_millis(130)).await;
            store.set(envelope.correlation_id.to_string(), "42");
        }
    });

    let started = Instant::now();
    let outcome = gateway.handle("hello".to_string(), None).await.unwrap();
    consumer.await.unwrap();

    assert_eq!(outcome.result, Some("42".to_string()));
    assert!(started.elapsed() <= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn never_written_key_reports_absence_not_error() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(InMemoryResultStore::new());
    let policy = PollPolicy::new(Duration::from_millis(50), 5);
    let gateway = orchestrator(publisher, store, policy);

    let started = Instant::now();
    let outcome = gateway.handle("hello".to_string(), None).await.unwrap();

    assert_eq!(outcome.result, None);
    assert_eq!(started.elapsed(), Duration::from_millis(250));
}

/// A store double whose lookups hold a lease for the duration of the call,
/// so cancellation mid-lookup is observable: the lease must drop and the
/// lookup counter must stop advancing.
struct LeasedStore {
    outstanding: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    gets: std::sync::Arc<std::sync::atomic::AtomicU32>,
    hold: Duration,
}

impl relay_core::ResultStore for LeasedStore {
    fn get(
        &self,
        _key: relay_core::CorrelationId,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Option<String>, StoreError>> + Send + '_>,
    > {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Lease(Arc<AtomicUsize>);
        impl Drop for Lease {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        self.gets.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let lease = Lease(Arc::clone(&self.outstanding));
        let hold = self.hold;
        Box::pin(async move {
            let _lease = lease;
            tokio::time::sleep(hold).await;
            Ok(None)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn aborted_request_stops_polling_and_releases_its_lease() {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    let outstanding = Arc::new(AtomicUsize::new(0));
    let gets = Arc::new(AtomicU32::new(0));
    let store = Arc::new(LeasedStore {
        outstanding: Arc::clone(&outstanding),
        gets: Arc::clone(&gets),
        hold: Duration::from_millis(20),
    });
    let publisher = Arc::new(MockPublisher::confirming());
    let policy = PollPolicy::new(Duration::from_millis(50), 10);
    let gateway = Arc::new(orchestrator(publisher, store, policy));

    let task = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        async move { gateway.handle("hello".to_string(), None).await }
    });

    // Each attempt sleeps 50ms then holds its lookup for 20ms; 130ms lands
    // inside the second lookup, so the abort cancels a held lease.
    tokio::time::sleep(Duration::from_millis(130)).await;
    assert_eq!(outstanding.load(Ordering::SeqCst), 1);
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert_eq!(outstanding.load(Ordering::SeqCst), 0, "cancelled lookup leaked its lease");

    // The poll loop is gone: no further lookups however long we wait.
    let lookups_at_abort = gets.load(Ordering::SeqCst);
    assert_eq!(lookups_at_abort, 2);
    tokio::time::sleep(policy.budget()).await;
    assert_eq!(gets.load(Ordering::SeqCst), lookups_at_abort);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_get_distinct_correlation_ids() {
    let publisher = Arc::new(MockPublisher::confirming());
    let store = Arc::new(ScriptedStore::never());
    let policy = PollPolicy::new(Duration::from_millis(10), 1);
    let gateway = Arc::new(orchestrator(publisher.clone(), store, policy));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let gateway = Arc::clone(&gateway);
        tasks.push(tokio::spawn(async move {
            gateway.handle(format!("payload-{i}"), None).await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert!(ids.insert(outcome.correlation_id), "correlation ids collided");
    }
    assert_eq!(publisher.publish_count(), 8);
}
