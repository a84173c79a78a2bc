//! Observability for the sensor agent
//!
//! Structured logging through `tracing` and an in-process metrics collector
//! that is summarised in the logs on shutdown.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, level_from_verbosity, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{mqtt_span, sample_span};
