//! Logging decorator tests: emitted events and recorded metrics.

use super::*;
use crate::errors::InvokerError;
use crate::invoker::{BaseInvoker, Invoker, InvokerLayer, Operation, SharedInvoker};
use crate::mocks::{ClientBehavior, LogCapture, MockClientFactory, MockRemoteClient};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

fn logged(
    factory: &MockClientFactory,
    metrics: Option<Arc<InMemoryMetricsCollector>>,
) -> SharedInvoker<MockRemoteClient> {
    let base: SharedInvoker<MockRemoteClient> =
        Arc::new(BaseInvoker::new(Arc::new(factory.clone())));
    let layer = match metrics {
        Some(m) => LoggingLayer::new().with_metrics(m),
        None => LoggingLayer::new(),
    };
    layer.layer(base)
}

fn echo(value: u32) -> Operation<MockRemoteClient> {
    Operation::with_result(move |client: Arc<MockRemoteClient>| async move {
        client.call(value).await
    })
}

#[tokio::test]
async fn test_success_logs_start_and_completion() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let invoker = logged(&MockClientFactory::new(), None);

    invoker.invoke(echo(1), CancellationToken::new()).await.unwrap();

    let events = capture.events();
    let started = events
        .iter()
        .find(|e| e.message == "invoking remote client")
        .unwrap();
    assert_eq!(started.level, Level::INFO);
    assert_eq!(started.field("kind"), Some("with_result"));

    let completed = events
        .iter()
        .find(|e| e.message == "remote client invocation completed")
        .unwrap();
    assert_eq!(completed.level, Level::INFO);
    assert!(completed.field("elapsed_ms").is_some());
    assert_eq!(capture.count("remote client invocation failed"), 0);
}

#[tokio::test]
async fn test_failure_is_logged_and_returned_unchanged() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new().fail_call(InvokerError::client_fault("bad request")),
    ]);
    let invoker = logged(&factory, None);

    let result = invoker.invoke(echo(1), CancellationToken::new()).await;

    assert_eq!(result.unwrap_err(), InvokerError::client_fault("bad request"));
    let failed = capture
        .events()
        .into_iter()
        .find(|e| e.message == "remote client invocation failed")
        .unwrap();
    assert_eq!(failed.level, Level::ERROR);
    assert!(failed.field("elapsed_ms").is_some());
    assert!(failed.field("error").unwrap().contains("bad request"));
    assert_eq!(capture.count("remote client invocation completed"), 0);
}

#[tokio::test]
async fn test_metrics_are_recorded_per_client() {
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new(),
        ClientBehavior::new().fail_open(InvokerError::connectivity("refused")),
    ]);
    let invoker = logged(&factory, Some(metrics.clone()));

    invoker.invoke(echo(1), CancellationToken::new()).await.unwrap();
    invoker.invoke(echo(2), CancellationToken::new()).await.unwrap_err();

    let client = std::any::type_name::<MockRemoteClient>();
    let labels = [("client", client)];
    let total = InMemoryMetricsCollector::key(metric_names::INVOCATIONS_TOTAL, &labels);
    assert_eq!(metrics.get_counter(&total), 2);
    assert_eq!(
        metrics
            .get_histogram(&InMemoryMetricsCollector::key(
                metric_names::INVOCATION_DURATION_MS,
                &labels
            ))
            .len(),
        2
    );
    assert_eq!(
        metrics.get_counter(&InMemoryMetricsCollector::key(
            metric_names::INVOCATION_ERRORS,
            &[("client", client), ("category", "connectivity")]
        )),
        1
    );
    let in_flight = InMemoryMetricsCollector::key(metric_names::INVOCATIONS_IN_FLIGHT, &labels);
    assert_eq!(metrics.get_gauge(&in_flight), Some(0.0));
}

#[tokio::test]
async fn test_commands_are_logged_with_their_kind() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let invoker = logged(&MockClientFactory::new(), None);

    let command = Operation::without_result(|client: Arc<MockRemoteClient>| async move {
        client.call(()).await
    });
    invoker.invoke(command, CancellationToken::new()).await.unwrap();

    let started = capture
        .events()
        .into_iter()
        .find(|e| e.message == "invoking remote client")
        .unwrap();
    assert_eq!(started.field("kind"), Some("without_result"));
}

#[test]
fn test_layer_name() {
    assert_eq!(InvokerLayer::<MockRemoteClient>::name(&LoggingLayer::new()), "logging");
}
