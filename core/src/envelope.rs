//! The request envelope published to the broker.

use crate::correlation::CorrelationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the publisher sends for one inbound request.
///
/// Immutable once the orchestrator has built it and injected the trace
/// headers; the publisher takes it by value and owns it for the duration of
/// the send. The payload and trace headers are opaque to this crate.
///
/// On the wire the envelope splits in two: [`WireBody`] travels as the record
/// payload (JSON, so a consumer in any language can read it), while
/// `trace_headers` travel as broker record headers so tracing middleware on
/// the consumer side finds them where it expects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// The correlation id, also used as the record key.
    pub correlation_id: CorrelationId,
    /// Opaque request content, forwarded to the consumer untransformed.
    pub payload: String,
    /// Propagated trace-context headers (name → value).
    pub trace_headers: HashMap<String, String>,
}

impl RequestEnvelope {
    /// Build an envelope with no trace headers yet.
    #[must_use]
    pub fn new(correlation_id: CorrelationId, payload: impl Into<String>) -> Self {
        Self {
            correlation_id,
            payload: payload.into(),
            trace_headers: HashMap::new(),
        }
    }

    /// The JSON record payload sent to the broker.
    #[must_use]
    pub fn wire_body(&self) -> WireBody {
        WireBody {
            correlation_id: self.correlation_id.to_string(),
            payload: self.payload.clone(),
        }
    }
}

/// The record payload as the consumer sees it.
///
/// The consumer needs the correlation id inside the body to know which store
/// key to write the result under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBody {
    /// Canonical string form of the correlation id.
    pub correlation_id: String,
    /// Opaque request content.
    pub payload: String,
}

impl WireBody {
    /// Serialize to the JSON bytes placed in the broker record.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
