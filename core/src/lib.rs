//! # Relay Core
//!
//! Core types and request orchestration for the relay gateway: a bridge from
//! a synchronous HTTP API to an asynchronous, message-queue-backed pipeline,
//! with a shared key-value store as the rendezvous point.
//!
//! ## Request flow
//!
//! ```text
//! ┌──────────────┐
//! │ HTTP request │
//! └──────┬───────┘
//!        │ mint correlation id + trace context
//!        ▼
//! ┌──────────────────┐
//! │  Publish to the  │◄─── envelope {id, payload} + trace headers,
//! │  message broker  │     keyed by the correlation id
//! └──────┬───────────┘
//!        │                       ┌─────────────────────┐
//!        │   (out of process)    │  Consumer writes a  │
//!        │  ────────────────────►│  result under the   │
//!        │                       │  correlation key    │
//!        ▼                       └─────────────────────┘
//! ┌──────────────────┐
//! │ Poll the store   │◄─── fixed interval × bounded attempts
//! │ at key = id      │
//! └──────┬───────────┘
//!        ▼
//!   found / not-found / store error → HTTP response
//! ```
//!
//! ## Crate layout
//!
//! - [`correlation`]: correlation id generation
//! - [`envelope`]: the immutable request envelope and its wire body
//! - [`propagation`]: pluggable trace-context propagation formats
//! - [`publisher`]: the broker publisher port
//! - [`store`]: the rendezvous store port
//! - [`poller`]: bounded fixed-interval polling against the store
//! - [`orchestrator`]: the per-request control flow tying it together
//! - [`error`]: the error taxonomy shared across ports
//!
//! Broker and store implementations live in `relay-kafka` and `relay-redis`;
//! this crate only defines the ports they implement.

#![forbid(unsafe_code)]

pub mod correlation;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod propagation;
pub mod publisher;
pub mod store;

pub use correlation::CorrelationId;
pub use envelope::RequestEnvelope;
pub use error::{PublishError, RelayError, StoreError};
pub use orchestrator::{Orchestrator, RelayOutcome};
pub use poller::{PollOutcome, PollPolicy};
pub use propagation::{PropagationFormat, Propagator, TraceContext};
pub use publisher::{DeliveryHandle, PublishAck, RequestPublisher};
pub use store::ResultStore;
