//! Observability utilities.
//!
//! Structured logging goes through `tracing`. Applications that do not
//! install their own subscriber can call [`init_tracing`] or
//! [`init_json_tracing`].

mod spans;
mod subscriber;

pub use spans::{FlowSpanAttributes, SpanTimer};
pub use subscriber::{init_json_tracing, init_tracing};
