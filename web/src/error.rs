//! Error types for web handlers.
//!
//! This module bridges relay errors and HTTP responses, implementing Axum's
//! `IntoResponse` trait. The mapping follows the gateway's error taxonomy: a
//! broker that never took the envelope is a bad gateway, a broker that took
//! too long is a gateway timeout, and a failing rendezvous store is a
//! service-unavailable condition.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::{PublishError, RelayError, StoreError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Wraps relay errors and provides HTTP-friendly error responses. The
/// internal source is logged, never exposed to the client.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 502 Bad Gateway error.
    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            message.into(),
            "UPSTREAM_UNAVAILABLE".to_string(),
        )
    }

    /// Create a 504 Gateway Timeout error.
    #[must_use]
    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            message.into(),
            "UPSTREAM_TIMEOUT".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    #[cfg(test)]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "request failed"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        let mapped = match &err {
            RelayError::Publish(PublishError::Timeout(_)) => {
                Self::gateway_timeout("message broker did not acknowledge in time")
            }
            RelayError::Publish(PublishError::Serialization(_)) => {
                Self::internal("failed to encode request envelope")
            }
            RelayError::Publish(PublishError::BrokerUnavailable(_)) => {
                Self::bad_gateway("message broker unavailable")
            }
            RelayError::Store(StoreError::PoolExhausted { .. }) => {
                Self::unavailable("result store connection pool exhausted")
            }
            RelayError::Store(_) => Self::unavailable("result store unavailable"),
        };
        mapped.with_source(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn display_includes_code_and_message() {
        let err = AppError::bad_request("payload must not be empty");
        assert_eq!(err.to_string(), "[BAD_REQUEST] payload must not be empty");
    }

    #[test]
    fn publish_timeout_maps_to_gateway_timeout() {
        let err: AppError =
            RelayError::Publish(PublishError::Timeout(Duration::from_secs(5))).into();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn broker_unavailable_maps_to_bad_gateway() {
        let err: AppError =
            RelayError::Publish(PublishError::BrokerUnavailable("down".to_string())).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn store_failures_map_to_service_unavailable() {
        let err: AppError = RelayError::Store(StoreError::PoolExhausted {
            waited: Duration::from_secs(5),
        })
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError =
            RelayError::Store(StoreError::ConnectionUnavailable("down".to_string())).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
