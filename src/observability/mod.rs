//! Observability
//!
//! Subscriber setup for the `tracing` events emitted by the pipeline.

pub mod tracing;

pub use self::tracing::{LogFormat, TracingConfig, init_tracing};
