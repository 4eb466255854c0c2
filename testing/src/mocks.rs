//! Scriptable doubles for the publisher and store ports.

#![allow(clippy::unwrap_used)] // Test infrastructure trades recovery for directness
#![allow(clippy::expect_used)]

use relay_core::publisher::DeliveryReport;
use relay_core::{
    CorrelationId, PublishAck, PublishError, RequestEnvelope, RequestPublisher, ResultStore,
    StoreError,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
enum PublishBehavior {
    Confirm,
    Fail(PublishError),
    Pending,
}

/// A [`RequestPublisher`] double that records every envelope.
///
/// Three behaviors cover the interesting publish paths: confirm
/// synchronously, fail synchronously, or return a pending ack whose delivery
/// report the test completes by hand (the fire-and-forget shape).
pub struct MockPublisher {
    behavior: PublishBehavior,
    envelopes: Mutex<Vec<RequestEnvelope>>,
    pending_reports: Mutex<VecDeque<DeliveryReport>>,
}

impl MockPublisher {
    /// Every publish succeeds with a confirmed ack.
    #[must_use]
    pub fn confirming() -> Self {
        Self::with_behavior(PublishBehavior::Confirm)
    }

    /// Every publish fails with the given error.
    #[must_use]
    pub fn failing(error: PublishError) -> Self {
        Self::with_behavior(PublishBehavior::Fail(error))
    }

    /// Every publish returns a pending ack; complete its report with
    /// [`complete_next_delivery`](Self::complete_next_delivery).
    #[must_use]
    pub fn pending() -> Self {
        Self::with_behavior(PublishBehavior::Pending)
    }

    fn with_behavior(behavior: PublishBehavior) -> Self {
        Self {
            behavior,
            envelopes: Mutex::new(Vec::new()),
            pending_reports: Mutex::new(VecDeque::new()),
        }
    }

    /// Complete the oldest outstanding delivery report.
    ///
    /// # Panics
    ///
    /// If no publish has produced a pending ack yet.
    pub fn complete_next_delivery(&self, outcome: Result<(), PublishError>) {
        let report = lock(&self.pending_reports)
            .pop_front()
            .expect("no pending delivery report to complete");
        report.complete(outcome);
    }

    /// How many envelopes were published.
    #[must_use]
    pub fn publish_count(&self) -> usize {
        lock(&self.envelopes).len()
    }

    /// All published envelopes, in order.
    #[must_use]
    pub fn envelopes(&self) -> Vec<RequestEnvelope> {
        lock(&self.envelopes).clone()
    }

    /// The most recently published envelope, if any.
    #[must_use]
    pub fn last_envelope(&self) -> Option<RequestEnvelope> {
        lock(&self.envelopes).last().cloned()
    }
}

impl RequestPublisher for MockPublisher {
    fn publish(
        &self,
        envelope: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, PublishError>> + Send + '_>> {
        lock(&self.envelopes).push(envelope);
        let behavior = self.behavior.clone();
        Box::pin(async move {
            match behavior {
                PublishBehavior::Confirm => Ok(PublishAck::Confirmed),
                PublishBehavior::Fail(error) => Err(error),
                PublishBehavior::Pending => {
                    let (report, handle) = relay_core::DeliveryHandle::channel();
                    lock(&self.pending_reports).push_back(report);
                    Ok(PublishAck::Pending(handle))
                }
            }
        })
    }
}

/// A [`ResultStore`] that plays back a scripted sequence of lookups.
///
/// Each `get` consumes the next scripted step; once the script is empty every
/// further lookup returns `Ok(None)`. The call counter makes attempt-count
/// assertions direct.
pub struct ScriptedStore {
    script: Mutex<VecDeque<Result<Option<String>, StoreError>>>,
    get_count: AtomicU32,
}

impl ScriptedStore {
    /// A store where the result never appears.
    #[must_use]
    pub fn never() -> Self {
        Self::from_script(Vec::new())
    }

    /// The result appears on lookup number `attempt` (1-based); earlier
    /// lookups see absence.
    #[must_use]
    pub fn found_on_attempt(attempt: u32, value: impl Into<String>) -> Self {
        let mut script: Vec<Result<Option<String>, StoreError>> = Vec::new();
        for _ in 1..attempt {
            script.push(Ok(None));
        }
        script.push(Ok(Some(value.into())));
        Self::from_script(script)
    }

    /// Lookup number `attempt` (1-based) fails with the given error; earlier
    /// lookups see absence.
    #[must_use]
    pub fn failing_on_attempt(attempt: u32, error: StoreError) -> Self {
        let mut script: Vec<Result<Option<String>, StoreError>> = Vec::new();
        for _ in 1..attempt {
            script.push(Ok(None));
        }
        script.push(Err(error));
        Self::from_script(script)
    }

    fn from_script(script: Vec<Result<Option<String>, StoreError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            get_count: AtomicU32::new(0),
        }
    }

    /// How many lookups have been issued.
    #[must_use]
    pub fn get_count(&self) -> u32 {
        self.get_count.load(Ordering::SeqCst)
    }
}

impl ResultStore for ScriptedStore {
    fn get(
        &self,
        _key: CorrelationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + '_>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        let step = lock(&self.script).pop_front().unwrap_or(Ok(None));
        Box::pin(async move { step })
    }
}

/// A writable in-memory [`ResultStore`].
///
/// End-to-end tests play the downstream consumer with it: a test task calls
/// [`set`](Self::set) under the correlation key while the gateway polls.
#[derive(Default)]
pub struct InMemoryResultStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryResultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value under a key, as the consumer side would.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        lock(&self.values).insert(key.into(), value.into());
    }
}

impl ResultStore for InMemoryResultStore {
    fn get(
        &self,
        key: CorrelationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + '_>> {
        let value = lock(&self.values).get(&key.to_string()).cloned();
        Box::pin(async move { Ok(value) })
    }
}
