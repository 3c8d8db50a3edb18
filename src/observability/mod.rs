//! Observability: structured logging, invocation metrics, and the logging
//! decorator.
//!
//! ```rust,no_run
//! use integrations_client_invoker::observability::{
//!     InMemoryMetricsCollector, LogFormat, LogLevel, LoggingConfig, MetricsCollector,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! LoggingConfig::new()
//!     .with_level(LogLevel::Info)
//!     .with_format(LogFormat::Json)
//!     .init()?;
//!
//! let metrics = InMemoryMetricsCollector::new();
//! metrics.increment_counter("invoker.invocations.total", 1, &[("client", "orders")]);
//! # Ok(())
//! # }
//! ```

mod invoker;
mod logging;
mod metrics;

#[cfg(test)]
mod tests;

pub use invoker::{LoggingInvoker, LoggingLayer};
pub use logging::{LogFormat, LogLevel, LoggingConfig, LOG_TARGET};
pub use metrics::{metric_names, InMemoryMetricsCollector, MetricsCollector, NoopMetricsCollector};
