//! End-to-end behavior of built invoker chains.

use super::*;
use crate::cache::MemoryCacheStore;
use crate::client::{ClientFactory, ClientState};
use crate::errors::InvokerError;
use crate::mocks::{ClientBehavior, LogCapture, MockClientFactory, MockRemoteClient};
use crate::resilience::{ResilienceConfig, ResilienceLayer};
use futures::future::join_all;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

type Chain = InvokerChain<MockRemoteClient>;

/// Records the order in which invocations pass through it.
struct RecordingInvoker {
    name: &'static str,
    inner: SharedInvoker<MockRemoteClient>,
    trail: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Invoker<MockRemoteClient> for RecordingInvoker {
    async fn invoke(
        &self,
        operation: Operation<MockRemoteClient>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        self.trail.lock().push(self.name);
        self.inner.invoke(operation, cancel).await
    }
}

fn recording(
    name: &'static str,
    trail: &Arc<Mutex<Vec<&'static str>>>,
) -> LayerFn<
    impl Fn(SharedInvoker<MockRemoteClient>) -> SharedInvoker<MockRemoteClient> + Send + Sync,
> {
    let trail = trail.clone();
    layer_fn(name, move |inner: SharedInvoker<MockRemoteClient>| {
        Arc::new(RecordingInvoker {
            name,
            inner,
            trail: trail.clone(),
        }) as SharedInvoker<MockRemoteClient>
    })
}

#[tokio::test(start_paused = true)]
async fn test_retry_then_logging_scenario() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new().fail_open(InvokerError::connectivity("handshake refused")),
        ClientBehavior::new().fail_open(InvokerError::connectivity("handshake refused")),
    ]);
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_resilience()
        .add_logging()
        .build()
        .unwrap();

    let started = Instant::now();
    let answer = chain
        .invoke(|client: Arc<MockRemoteClient>| async move { client.call(42u32).await })
        .await
        .unwrap();

    assert_eq!(answer, 42);
    assert!(started.elapsed() >= Duration::from_secs(3));

    let journal = factory.journal();
    assert_eq!(journal.created(), 3);
    assert_eq!(
        journal.final_states(),
        vec![ClientState::Faulted, ClientState::Faulted, ClientState::Closed]
    );

    assert_eq!(capture.count("remote client invocation completed"), 1);
    assert_eq!(capture.count("remote client invocation failed"), 2);
    assert_eq!(capture.count("retrying remote client invocation"), 2);
}

#[tokio::test]
async fn test_concurrent_invocations_never_share_clients() {
    let factory = MockClientFactory::new();
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_logging()
        .build()
        .unwrap();

    let calls = (0..16).map(|_| {
        let chain = chain.clone();
        async move {
            chain
                .invoke(|client: Arc<MockRemoteClient>| async move {
                    let id = client.id();
                    tokio::task::yield_now().await;
                    client.call(id).await
                })
                .await
        }
    });
    let ids = join_all(calls)
        .await
        .into_iter()
        .collect::<InvokeResult<Vec<_>>>()
        .unwrap();

    let distinct: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(distinct.len(), 16);

    let journal = factory.journal();
    assert_eq!(journal.created(), 16);
    assert_eq!(journal.operations(), 16);
    assert!(journal
        .final_states()
        .iter()
        .all(|state| *state == ClientState::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_every_outcome_leaves_clients_terminal() {
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new(),
        ClientBehavior::new().fail_open(InvokerError::client_fault("unauthorized")),
        ClientBehavior::new().fail_call(InvokerError::client_fault("bad argument")),
        ClientBehavior::new().fail_close(InvokerError::connectivity("reset on close")),
        ClientBehavior::new().open_delay(Duration::from_secs(30)),
        ClientBehavior::new(),
    ]);
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_resilience_with(ResilienceConfig {
            attempt_timeout: Duration::from_secs(5),
            ..ResilienceConfig::single_attempt()
        })
        .add_logging()
        .build()
        .unwrap();

    let echo = |client: Arc<MockRemoteClient>| async move { client.call(1u8).await };
    assert!(chain.invoke(echo).await.is_ok());
    assert!(chain.invoke(echo).await.is_err());
    assert!(chain.invoke(echo).await.is_err());
    assert!(chain.invoke(echo).await.is_ok());
    assert!(matches!(chain.invoke(echo).await, Err(InvokerError::Timeout { .. })));

    // Fault the connection mid-operation.
    let faulting = |client: Arc<MockRemoteClient>| async move {
        client.fault();
        Err::<u8, _>(InvokerError::connectivity("stream reset"))
    };
    assert!(chain.invoke(faulting).await.is_err());

    let states = factory.journal().final_states();
    assert_eq!(states.len(), 6);
    assert!(states.iter().all(ClientState::is_terminal), "{:?}", states);
    assert_eq!(
        states,
        vec![
            ClientState::Closed,
            ClientState::Faulted,
            ClientState::Closed,
            ClientState::Faulted,
            ClientState::Closed,
            ClientState::Faulted,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cached_result_is_reused_within_ttl() {
    let factory = MockClientFactory::new();
    let store = Arc::new(MemoryCacheStore::with_capacity(16));
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_cache_with_store(Duration::from_secs(60), store.clone())
        .build()
        .unwrap();

    let first: String = chain
        .invoke(|client: Arc<MockRemoteClient>| async move {
            client.call(format!("client-{}", client.id())).await
        })
        .await
        .unwrap();
    let second: String = chain
        .invoke(|client: Arc<MockRemoteClient>| async move {
            client.call(format!("client-{}", client.id())).await
        })
        .await
        .unwrap();

    assert_eq!(first, "client-0");
    assert_eq!(second, "client-0");
    assert_eq!(factory.journal().created(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    let third: String = chain
        .invoke(|client: Arc<MockRemoteClient>| async move {
            client.call(format!("client-{}", client.id())).await
        })
        .await
        .unwrap();

    assert_eq!(third, "client-1");
    assert_eq!(factory.journal().created(), 2);
}

#[tokio::test]
async fn test_commands_never_touch_the_cache() {
    let factory = MockClientFactory::new();
    let store = Arc::new(MemoryCacheStore::with_capacity(16));
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_cache_with_store(Duration::from_secs(60), store.clone())
        .build()
        .unwrap();

    for _ in 0..3 {
        chain
            .execute(|client: Arc<MockRemoteClient>| async move { client.call(()).await })
            .await
            .unwrap();
    }

    assert_eq!(factory.journal().created(), 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_error_from_last_attempt_reaches_caller_unwrapped() {
    let factory = MockClientFactory::new().with_script(vec![ClientBehavior::new().fail_call(
        InvokerError::ServerFault {
            message: "shard unavailable".to_string(),
            code: Some("E503".to_string()),
        },
    )]);
    let trail = Arc::new(Mutex::new(Vec::new()));
    let chain = Chain::builder()
        .factory(factory)
        .add_logging()
        .add_layer(recording("audit", &trail))
        .add_cache_with_store(Duration::from_secs(60), Arc::new(MemoryCacheStore::with_capacity(4)))
        .build()
        .unwrap();

    let error = chain
        .invoke(|client: Arc<MockRemoteClient>| async move { client.call(1u32).await })
        .await
        .unwrap_err();

    assert_eq!(
        error,
        InvokerError::ServerFault {
            message: "shard unavailable".to_string(),
            code: Some("E503".to_string()),
        }
    );
}

#[tokio::test]
async fn test_first_added_layer_is_outermost() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let chain = Chain::builder()
        .factory(MockClientFactory::new())
        .add_layer(recording("first", &trail))
        .add_layer(recording("second", &trail))
        .add_logging()
        .add_layer(recording("third", &trail))
        .build()
        .unwrap();

    chain
        .execute(|client: Arc<MockRemoteClient>| async move { client.call(()).await })
        .await
        .unwrap();

    assert_eq!(*trail.lock(), vec!["first", "second", "third"]);
    assert_eq!(chain.layers(), ["first", "second", "logging", "third"]);
}

#[test]
fn test_layer_names_of_builtin_decorators() {
    let chain = Chain::builder()
        .factory(MockClientFactory::new())
        .add_resilience()
        .add_cache(Duration::from_secs(1))
        .add_logging()
        .build()
        .unwrap();

    assert_eq!(chain.layers(), ["resilience", "cache", "logging"]);
}

#[test]
fn test_build_without_factory_fails() {
    let result = Chain::builder().add_logging().build();
    assert!(matches!(result, Err(InvokerError::Configuration { .. })));
}

#[tokio::test]
async fn test_builder_config_drives_default_resilience() {
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new().fail_open(InvokerError::connectivity("refused")),
        ClientBehavior::new().fail_open(InvokerError::connectivity("refused")),
    ]);
    let config = crate::config::InvokerConfig::builder()
        .max_attempts(2)
        .base_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    let chain = Chain::builder()
        .factory(factory.clone())
        .config(config)
        .add_resilience()
        .build()
        .unwrap();

    let result = chain
        .invoke(|client: Arc<MockRemoteClient>| async move { client.call(1u32).await })
        .await;

    assert_eq!(result.unwrap_err(), InvokerError::connectivity("refused"));
    assert_eq!(factory.journal().created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_builder_config_drives_cache_ttl() {
    let factory = MockClientFactory::new();
    let config = crate::config::InvokerConfig::builder()
        .cache_ttl(Duration::from_secs(5))
        .build()
        .unwrap();
    let chain = Chain::builder()
        .factory(factory.clone())
        .config(config)
        .add_configured_cache_in(Arc::new(MemoryCacheStore::with_capacity(4)))
        .build()
        .unwrap();
    let query = |client: Arc<MockRemoteClient>| async move { client.call(client.id()).await };

    assert_eq!(chain.invoke(query).await.unwrap(), 0);
    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(chain.invoke(query).await.unwrap(), 0);
    assert_eq!(factory.journal().created(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(chain.invoke(query).await.unwrap(), 1);
    assert_eq!(factory.journal().created(), 2);
}

#[test]
fn test_configured_cache_layer_is_named_cache() {
    let chain = Chain::builder()
        .factory(MockClientFactory::new())
        .add_configured_cache()
        .build()
        .unwrap();

    assert_eq!(chain.layers(), ["cache"]);
}

#[tokio::test]
async fn test_closure_factory_is_accepted() {
    let inner = MockClientFactory::new();
    let journal = inner.journal();
    let chain = Chain::builder()
        .factory(move || inner.create())
        .build()
        .unwrap();

    let value = chain
        .invoke(|client: Arc<MockRemoteClient>| async move { client.call(5u16).await })
        .await
        .unwrap();

    assert_eq!(value, 5);
    assert_eq!(journal.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_chain_and_tears_down() {
    let factory = MockClientFactory::new()
        .with_script(vec![ClientBehavior::new().call_delay(Duration::from_secs(10))]);
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_resilience()
        .add_logging()
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = chain
        .invoke_with_cancellation(
            |client: Arc<MockRemoteClient>| async move { client.call(1u32).await },
            &cancel,
        )
        .await;

    assert_eq!(result.unwrap_err(), InvokerError::Cancelled);
    let journal = factory.journal();
    assert_eq!(journal.created(), 1);
    assert_eq!(journal.final_states(), vec![ClientState::Closed]);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_invocation_leaves_no_open_client() {
    let factory = MockClientFactory::new();
    let chain = Chain::builder()
        .factory(factory.clone())
        .add_logging()
        .build()
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        chain.invoke(|client: Arc<MockRemoteClient>| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            client.call(1u8).await
        }),
    )
    .await;

    assert!(result.is_err());
    let journal = factory.journal();
    assert_eq!(journal.created(), 1);
    assert_eq!(journal.aborts(), 1);
    assert!(journal.final_states().iter().all(ClientState::is_terminal));
}

#[tokio::test]
async fn test_wrong_output_type_is_reported() {
    let chain = Chain::builder()
        .factory(MockClientFactory::new())
        .add_layer(layer_fn("swap", |inner: SharedInvoker<MockRemoteClient>| {
            let _ = inner;
            Arc::new(StaticInvoker) as SharedInvoker<MockRemoteClient>
        }))
        .build()
        .unwrap();

    let result = chain
        .invoke(|client: Arc<MockRemoteClient>| async move { client.call(1u32).await })
        .await;

    assert!(matches!(result, Err(InvokerError::InvalidState { .. })));
}

struct StaticInvoker;

#[async_trait]
impl Invoker<MockRemoteClient> for StaticInvoker {
    async fn invoke(
        &self,
        _operation: Operation<MockRemoteClient>,
        _cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        Ok(Arc::new("not a number"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_chain_can_be_wrapped_by_another_decorator() {
    let factory = MockClientFactory::new().with_script(vec![
        ClientBehavior::new().fail_open(InvokerError::connectivity("refused")),
    ]);
    let inner_chain = Chain::builder()
        .factory(factory.clone())
        .add_logging()
        .build()
        .unwrap();

    let outer =
        ResilienceLayer::default().layer(Arc::new(inner_chain) as SharedInvoker<MockRemoteClient>);
    let operation = Operation::with_result(|client: Arc<MockRemoteClient>| async move {
        client.call(8u32).await
    });
    let output = outer.invoke(operation, CancellationToken::new()).await.unwrap();

    assert_eq!(output.downcast_ref::<u32>(), Some(&8));
    assert_eq!(factory.journal().created(), 2);
}
