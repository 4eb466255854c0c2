//! Axum HTTP surface for the relay gateway.
//!
//! # Request Flow
//!
//! 1. **HTTP request** arrives at the relay handler
//! 2. **Extract** the payload and any inbound trace headers
//! 3. **Relay** through the orchestrator (publish, then poll the rendezvous
//!    store)
//! 4. **Map** the outcome to JSON: the value, an explicit `null`, or an
//!    error status
//!
//! The handlers hold no transport details; everything broker- and
//! store-specific lives behind the orchestrator's ports, so this crate tests
//! against in-memory mocks.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
