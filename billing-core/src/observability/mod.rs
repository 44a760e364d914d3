//! Tracing setup and trace-context propagation for outgoing requests.

pub mod logging;
pub mod trace_context;

pub use logging::{init_tracing, TelemetryError};
pub use trace_context::{inject_trace_context, TraceContextExt, TRACEPARENT_HEADER};
