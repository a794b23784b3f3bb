//! Runtime wiring: validated configuration, tracing setup and counters, and
//! the per-topic dispatcher that owns every scheduling loop.

pub mod config;
pub mod dispatcher;
pub mod telemetry;
