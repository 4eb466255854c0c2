//! Pluggable trace-context propagation.
//!
//! The gateway sits on a synchronous→asynchronous→synchronous boundary: the
//! trace that starts at the inbound HTTP request must continue through the
//! broker message so the consumer's spans link into the same trace. Which
//! header names carry that context is a deployment decision, so the formats
//! live behind the [`Propagator`] capability pair (`inject`/`extract`) and
//! exactly one format is active at a time, selected by configuration.
//!
//! Two formats are provided:
//!
//! - [`W3cPropagator`]: the W3C Trace Context `traceparent`/`tracestate`
//!   headers.
//! - [`DatadogPropagator`]: the `x-datadog-*` header family.
//!
//! No vendor header name appears anywhere outside this module.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// An in-flight trace position: which trace we are part of and which span is
/// the current parent.
///
/// Shaped after the W3C model (128-bit trace id, 64-bit span id, a sampled
/// flag); vendor formats map onto it as best they can. Both ids are nonzero
/// by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// 128-bit trace identifier, nonzero.
    pub trace_id: u128,
    /// 64-bit identifier of the current span, nonzero.
    pub span_id: u64,
    /// Whether the trace is sampled.
    pub sampled: bool,
    /// Opaque vendor state carried through unmodified (W3C `tracestate`).
    pub state: Option<String>,
}

impl TraceContext {
    /// Start a fresh trace, for requests that arrive without one.
    #[must_use]
    pub fn root() -> Self {
        Self {
            trace_id: non_zero_u128(),
            span_id: non_zero_u64(),
            sampled: true,
            state: None,
        }
    }

    /// A child position in the same trace: same trace id, fresh span id.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: non_zero_u64(),
            sampled: self.sampled,
            state: self.state.clone(),
        }
    }
}

fn non_zero_u128() -> u128 {
    loop {
        let value: u128 = rand::random();
        if value != 0 {
            return value;
        }
    }
}

fn non_zero_u64() -> u64 {
    loop {
        let value: u64 = rand::random();
        if value != 0 {
            return value;
        }
    }
}

/// Capability pair for moving a [`TraceContext`] across a header map.
///
/// Implementations must be lossless across their own `inject` → `extract`
/// round trip for the fields their format can represent.
pub trait Propagator: Send + Sync {
    /// Write `context` into `headers` using this format's header names.
    fn inject(&self, context: &TraceContext, headers: &mut HashMap<String, String>);

    /// Read a context out of `headers`, if the expected headers are present
    /// and well-formed. Malformed headers yield `None`, never an error.
    fn extract(&self, headers: &HashMap<String, String>) -> Option<TraceContext>;
}

/// Which propagation format the deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationFormat {
    /// W3C Trace Context (`traceparent` / `tracestate`).
    #[default]
    W3c,
    /// Datadog native headers (`x-datadog-trace-id` / `x-datadog-parent-id`).
    Datadog,
}

impl PropagationFormat {
    /// The propagator implementing this format.
    #[must_use]
    pub fn propagator(self) -> Arc<dyn Propagator> {
        match self {
            Self::W3c => Arc::new(W3cPropagator),
            Self::Datadog => Arc::new(DatadogPropagator),
        }
    }
}

impl FromStr for PropagationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "w3c" | "tracecontext" => Ok(Self::W3c),
            "datadog" | "dd" => Ok(Self::Datadog),
            other => Err(format!("unknown propagation format: {other}")),
        }
    }
}

const TRACEPARENT: &str = "traceparent";
const TRACESTATE: &str = "tracestate";

/// W3C Trace Context propagation.
///
/// `traceparent` is `{version}-{trace-id}-{parent-id}-{flags}` with a 2-digit
/// version, 32 hex digits of trace id, 16 of span id and 2 of flags;
/// `tracestate` is carried through opaquely.
#[derive(Debug, Clone, Copy, Default)]
pub struct W3cPropagator;

impl Propagator for W3cPropagator {
    fn inject(&self, context: &TraceContext, headers: &mut HashMap<String, String>) {
        let flags: u8 = if context.sampled { 0x01 } else { 0x00 };
        headers.insert(
            TRACEPARENT.to_string(),
            format!(
                "00-{:032x}-{:016x}-{:02x}",
                context.trace_id, context.span_id, flags
            ),
        );
        if let Some(state) = &context.state {
            headers.insert(TRACESTATE.to_string(), state.clone());
        }
    }

    fn extract(&self, headers: &HashMap<String, String>) -> Option<TraceContext> {
        let traceparent = headers.get(TRACEPARENT)?;
        let mut parts = traceparent.split('-');

        let version = parts.next()?;
        if version.len() != 2 || version == "ff" {
            return None;
        }

        let trace_field = parts.next()?;
        if trace_field.len() != 32 {
            return None;
        }
        let trace_id = u128::from_str_radix(trace_field, 16).ok()?;

        let span_field = parts.next()?;
        if span_field.len() != 16 {
            return None;
        }
        let span_id = u64::from_str_radix(span_field, 16).ok()?;

        let flags_field = parts.next()?;
        if flags_field.len() != 2 {
            return None;
        }
        let flags = u8::from_str_radix(flags_field, 16).ok()?;

        if trace_id == 0 || span_id == 0 {
            return None;
        }

        Some(TraceContext {
            trace_id,
            span_id,
            sampled: flags & 0x01 != 0,
            state: headers.get(TRACESTATE).cloned(),
        })
    }
}

const DD_TRACE_ID: &str = "x-datadog-trace-id";
const DD_PARENT_ID: &str = "x-datadog-parent-id";
const DD_SAMPLING_PRIORITY: &str = "x-datadog-sampling-priority";

/// Datadog native header propagation.
///
/// Datadog trace ids are 64-bit decimals, so only the low 64 bits of the
/// trace id cross this format; extraction widens back with zero high bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatadogPropagator;

impl Propagator for DatadogPropagator {
    #[allow(clippy::cast_possible_truncation)]
    fn inject(&self, context: &TraceContext, headers: &mut HashMap<String, String>) {
        headers.insert(DD_TRACE_ID.to_string(), (context.trace_id as u64).to_string());
        headers.insert(DD_PARENT_ID.to_string(), context.span_id.to_string());
        headers.insert(
            DD_SAMPLING_PRIORITY.to_string(),
            if context.sampled { "1" } else { "0" }.to_string(),
        );
    }

    fn extract(&self, headers: &HashMap<String, String>) -> Option<TraceContext> {
        let trace_id: u64 = headers.get(DD_TRACE_ID)?.parse().ok()?;
        let span_id: u64 = headers.get(DD_PARENT_ID)?.parse().ok()?;
        if trace_id == 0 || span_id == 0 {
            return None;
        }

        let sampled = headers
            .get(DD_SAMPLING_PRIORITY)
            .and_then(|p| p.parse::<i32>().ok())
            .is_none_or(|p| p > 0);

        Some(TraceContext {
            trace_id: u128::from(trace_id),
            span_id,
            sampled,
            state: None,
        })
    }
}
