//! AMZPulse Telemetry - Structured Logging
//!
//! Installs the global `tracing` subscriber. Output is JSON by default and
//! human-readable when `PULSE_LOG_FORMAT=pretty`.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_FILTER};
