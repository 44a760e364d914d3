//! W3C trace context for calls to the backend and the auth service.

use opentelemetry::trace::TraceContextExt as _;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Write `traceparent` (and `tracestate` when non-empty) for the current
/// span. Leaves `headers` untouched when no valid span context exists.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let context = Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return;
    }

    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );
    if let Ok(value) = HeaderValue::from_str(&traceparent) {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&tracestate) {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }
}

/// Attach the current trace context to an outgoing request.
pub trait TraceContextExt {
    fn with_trace_context(self) -> Self;
}

impl TraceContextExt for reqwest::RequestBuilder {
    fn with_trace_context(self) -> Self {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        self.headers(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_span_means_no_headers() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn builder_without_span_still_sends() {
        let request = reqwest::Client::new()
            .get("http://localhost/api/creditbills")
            .with_trace_context()
            .build()
            .unwrap();
        assert!(request.headers().get(TRACEPARENT_HEADER).is_none());
    }
}
