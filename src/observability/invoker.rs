use crate::client::{client_type_name, RemoteClient};
use crate::errors::InvokeResult;
use crate::invoker::{Invoker, InvokerLayer, Operation, OperationKind, Output, SharedInvoker};
use crate::observability::metrics::{metric_names, MetricsCollector};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn kind_label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::WithResult => "with_result",
        OperationKind::WithoutResult => "without_result",
    }
}

/// Decorator logging the start, success and failure of every invocation.
///
/// Failures are logged and returned unchanged.
pub struct LoggingInvoker<C: RemoteClient> {
    inner: SharedInvoker<C>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    in_flight: AtomicU64,
}

impl<C: RemoteClient> LoggingInvoker<C> {
    /// Create a logging decorator around `inner`
    pub fn new(inner: SharedInvoker<C>) -> Self {
        Self {
            inner,
            metrics: None,
            in_flight: AtomicU64::new(0),
        }
    }

    /// Also record invocation metrics
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn started(&self, client: &str) {
        let in_flight = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(metrics) = &self.metrics {
            let labels = [("client", client)];
            metrics.increment_counter(metric_names::INVOCATIONS_TOTAL, 1, &labels);
            metrics.set_gauge(metric_names::INVOCATIONS_IN_FLIGHT, in_flight as f64, &labels);
        }
    }

    fn finished(&self, client: &str, elapsed_ms: u64, error_category: Option<&str>) {
        let in_flight = self.in_flight.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        let Some(metrics) = &self.metrics else {
            return;
        };

        let labels = [("client", client)];
        metrics.record_histogram(metric_names::INVOCATION_DURATION_MS, elapsed_ms as f64, &labels);
        metrics.set_gauge(metric_names::INVOCATIONS_IN_FLIGHT, in_flight as f64, &labels);
        if let Some(category) = error_category {
            metrics.increment_counter(
                metric_names::INVOCATION_ERRORS,
                1,
                &[("client", client), ("category", category)],
            );
        }
    }
}

#[async_trait]
impl<C: RemoteClient> Invoker<C> for LoggingInvoker<C> {
    async fn invoke(
        &self,
        operation: Operation<C>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        let client = client_type_name::<C>();
        let kind = kind_label(operation.kind());

        info!(client, kind, "invoking remote client");
        self.started(client);
        let start = Instant::now();

        let result = self.inner.invoke(operation, cancel).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                info!(client, kind, elapsed_ms, "remote client invocation completed");
                self.finished(client, elapsed_ms, None);
            }
            Err(e) => {
                error!(client, kind, elapsed_ms, error = %e, "remote client invocation failed");
                self.finished(client, elapsed_ms, Some(e.category().as_str()));
            }
        }

        result
    }
}

/// Layer producing a [`LoggingInvoker`].
#[derive(Clone, Default)]
pub struct LoggingLayer {
    metrics: Option<Arc<dyn MetricsCollector>>,
}

impl LoggingLayer {
    /// Log only
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<C: RemoteClient> InvokerLayer<C> for LoggingLayer {
    fn name(&self) -> String {
        "logging".to_string()
    }

    fn layer(&self, inner: SharedInvoker<C>) -> SharedInvoker<C> {
        let invoker = LoggingInvoker::new(inner);
        match &self.metrics {
            Some(metrics) => Arc::new(invoker.with_metrics(metrics.clone())),
            None => Arc::new(invoker),
        }
    }
}
