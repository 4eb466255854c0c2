//! The relay endpoint: accept a payload, publish it, await the rendezvous.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request body for `POST /api/relay`.
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    /// Opaque payload forwarded to the downstream consumer.
    pub payload: String,
}

/// Response body for `POST /api/relay`.
///
/// `result` is the consumer's value, or JSON `null` when no result appeared
/// before the poll deadline. Absence is an honest `null`, never an error
/// status.
#[derive(Debug, Serialize)]
pub struct RelayResponse {
    /// The correlation id minted for this request.
    pub correlation_id: String,
    /// The consumer's result, if it arrived in time.
    pub result: Option<String>,
}

/// Relay one request through the broker and poll for its result.
///
/// # Endpoint
///
/// ```text
/// POST /api/relay
/// {"payload": "..."}
/// ```
///
/// Inbound trace headers (W3C `traceparent` or the vendor equivalent,
/// whichever format the gateway is configured for) are extracted and
/// forwarded on the published envelope, so consumer-side spans join the
/// caller's trace.
///
/// # Errors
///
/// 400 for an empty payload, 502/504 when the broker refuses or times out,
/// 503 when the rendezvous store fails mid-poll.
pub async fn relay_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RelayRequest>,
) -> Result<Json<RelayResponse>, AppError> {
    metrics::counter!("relay.http.requests").increment(1);
    if request.payload.trim().is_empty() {
        return Err(AppError::bad_request("payload must not be empty"));
    }

    let carrier = header_carrier(&headers);
    let parent = state.orchestrator().propagator().extract(&carrier);

    let outcome = state
        .orchestrator()
        .handle(request.payload, parent.as_ref())
        .await?;

    Ok(Json(RelayResponse {
        correlation_id: outcome.correlation_id.to_string(),
        result: outcome.result,
    }))
}

/// Flatten HTTP headers into the string map the propagators read.
///
/// Header names arrive already lowercased; non-UTF-8 values cannot be trace
/// headers and are skipped.
fn header_carrier(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
