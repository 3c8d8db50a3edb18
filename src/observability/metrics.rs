//! Invocation metrics.
//!
//! Counters, histograms and gauges keyed by name plus an ordered label set.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for invocation metrics.
///
/// Implementations must be cheap to call from the invocation path and safe to
/// share between tasks.
pub trait MetricsCollector: Send + Sync {
    /// Increments a counter by `value`.
    fn increment_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]);

    /// Records a value in a histogram.
    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Sets a gauge to `value`.
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// In-memory metrics collector.
///
/// Labelled series are stored under `name:key=value,...`, in label order.
#[derive(Default)]
pub struct InMemoryMetricsCollector {
    counters: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
    gauges: RwLock<HashMap<String, f64>>,
}

impl InMemoryMetricsCollector {
    /// Creates an empty collector.
    ///
    /// ```
    /// use integrations_client_invoker::observability::{
    ///     InMemoryMetricsCollector, MetricsCollector,
    /// };
    ///
    /// let collector = InMemoryMetricsCollector::new();
    /// collector.increment_counter("invocations", 2, &[("client", "orders")]);
    /// assert_eq!(collector.get_counter("invocations:client=orders"), 2);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if it was never incremented
    pub fn get_counter(&self, key: &str) -> u64 {
        self.counters
            .read()
            .get(key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Every value recorded in a histogram
    pub fn get_histogram(&self, key: &str) -> Vec<f64> {
        self.histograms.read().get(key).cloned().unwrap_or_default()
    }

    /// Last value of a gauge
    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.read().get(key).copied()
    }

    /// Drops every series.
    pub fn reset(&self) {
        self.counters.write().clear();
        self.histograms.write().clear();
        self.gauges.write().clear();
    }

    /// Series key for `name` with `labels`, as used by the getters
    pub fn key(name: &str, labels: &[(&str, &str)]) -> String {
        if labels.is_empty() {
            return name.to_string();
        }
        let labels = labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:{}", name, labels)
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn increment_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        let key = Self::key(name, labels);
        if let Some(counter) = self.counters.read().get(&key) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        self.counters
            .write()
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::key(name, labels);
        self.histograms.write().entry(key).or_default().push(value);
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::key(name, labels);
        self.gauges.write().insert(key, value);
    }
}

/// Collector that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn increment_counter(&self, _name: &str, _value: u64, _labels: &[(&str, &str)]) {}
    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// Metric names recorded by the logging decorator.
///
/// Every series carries a `client` label with the client type name.
pub mod metric_names {
    /// Invocations started
    pub const INVOCATIONS_TOTAL: &str = "invoker.invocations.total";

    /// Failed invocations, additionally labelled with `category`
    pub const INVOCATION_ERRORS: &str = "invoker.invocations.errors";

    /// Wall time of an invocation in milliseconds, success or failure
    pub const INVOCATION_DURATION_MS: &str = "invoker.invocations.duration_ms";

    /// Invocations currently running through the decorator
    pub const INVOCATIONS_IN_FLIGHT: &str = "invoker.invocations.in_flight";
}
