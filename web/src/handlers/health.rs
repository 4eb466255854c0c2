//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the gateway
//! process is up. It deliberately does not touch the broker or the store:
//! those surface per-request as 502/503/504.

use axum::http::StatusCode;

/// Simple liveness check.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
