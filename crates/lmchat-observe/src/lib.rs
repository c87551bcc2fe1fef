//! Observability setup for lmchat: tracing subscriber and optional
//! OpenTelemetry export.

pub mod tracing_setup;

pub use tracing_setup::{default_directive, init_tracing, shutdown_tracing};
