//! Bounded connection pool and Redis-backed result store for the relay
//! gateway.
//!
//! The gateway's poll loop issues one `GET` per attempt per in-flight
//! request, so the store sits on the hot path of every request. Two pieces
//! keep that safe under concurrent load:
//!
//! - [`pool`]: a bounded, validate-on-borrow connection pool. Requests past
//!   the bound wait (with a timeout) instead of opening unbounded
//!   connections against the shared store.
//! - [`store`]: the [`ResultStore`](relay_core::ResultStore) implementation,
//!   one pooled `GET` per lookup, each bounded by a per-operation timeout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod pool;
pub mod store;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PooledConnection};
pub use store::RedisResultStore;
