//! Mock publishers and stores for testing the relay gateway.
//!
//! This crate provides:
//! - [`MockPublisher`]: a scriptable [`RequestPublisher`](relay_core::RequestPublisher)
//!   that records every envelope it sees
//! - [`ScriptedStore`]: a [`ResultStore`](relay_core::ResultStore) that plays
//!   back a fixed sequence of lookup results and counts its calls
//! - [`InMemoryResultStore`]: a writable store, standing in for the
//!   downstream consumer in end-to-end tests
//!
//! ## Example
//!
//! ```
//! use relay_testing::{MockPublisher, ScriptedStore};
//! use relay_core::{Orchestrator, PollPolicy, PropagationFormat};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let publisher = Arc::new(MockPublisher::confirming());
//! let store = Arc::new(ScriptedStore::found_on_attempt(2, "42"));
//!
//! let orchestrator = Orchestrator::new(
//!     publisher.clone(),
//!     store.clone(),
//!     PropagationFormat::W3c.propagator(),
//!     PollPolicy::new(Duration::from_millis(10), 5),
//! );
//!
//! let outcome = orchestrator.handle("hello".to_string(), None).await.unwrap();
//! assert_eq!(outcome.result, Some("42".to_string()));
//! assert_eq!(store.get_count(), 2);
//! # }
//! ```

#![forbid(unsafe_code)]

mod mocks;

pub use mocks::{InMemoryResultStore, MockPublisher, ScriptedStore};

/// Install a compact tracing subscriber for test output.
///
/// Honors `RUST_LOG`; safe to call from multiple tests, only the first call
/// installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
