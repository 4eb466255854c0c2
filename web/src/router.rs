//! Route table and middleware stack.

use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the gateway's router.
///
/// Two routes: the relay endpoint and a liveness check. HTTP-level tracing
/// wraps both; per-request relay logging happens inside the orchestrator
/// under the correlation id.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/relay", post(handlers::relay::relay_request))
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
