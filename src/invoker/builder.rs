use crate::cache::{CacheLayer, CacheStore};
use crate::client::{ClientFactory, RemoteClient};
use crate::config::InvokerConfig;
use crate::errors::{InvokeResult, InvokerError};
use crate::invoker::{BaseInvoker, Invoker, Operation, Output, SharedInvoker};
use crate::observability::{LoggingLayer, MetricsCollector};
use crate::resilience::{ResilienceConfig, ResilienceLayer};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wraps an inner invoker with one cross-cutting behavior.
pub trait InvokerLayer<C: RemoteClient>: Send + Sync {
    /// Name reported by [`InvokerChain::layers`]
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// Wrap `inner`, returning the decorated invoker
    fn layer(&self, inner: SharedInvoker<C>) -> SharedInvoker<C>;
}

/// A layer built from a closure. See [`layer_fn`].
pub struct LayerFn<F> {
    name: String,
    f: F,
}

/// Creates a named layer from a closure that wraps an inner invoker.
///
/// ```
/// use integrations_client_invoker::invoker::{layer_fn, SharedInvoker};
/// use integrations_client_invoker::mocks::MockRemoteClient;
///
/// let passthrough = layer_fn("passthrough", |inner: SharedInvoker<MockRemoteClient>| inner);
/// ```
pub fn layer_fn<C, F>(name: impl Into<String>, f: F) -> LayerFn<F>
where
    C: RemoteClient,
    F: Fn(SharedInvoker<C>) -> SharedInvoker<C> + Send + Sync,
{
    LayerFn {
        name: name.into(),
        f,
    }
}

impl<C, F> InvokerLayer<C> for LayerFn<F>
where
    C: RemoteClient,
    F: Fn(SharedInvoker<C>) -> SharedInvoker<C> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn layer(&self, inner: SharedInvoker<C>) -> SharedInvoker<C> {
        (self.f)(inner)
    }
}

/// Collects decorators in order and builds an [`InvokerChain`].
///
/// The first decorator added becomes the outermost layer. `build` consumes
/// the builder, so a chain cannot be built twice or extended afterwards:
///
/// ```compile_fail
/// use integrations_client_invoker::invoker::InvokerBuilder;
/// use integrations_client_invoker::mocks::{MockClientFactory, MockRemoteClient};
///
/// let builder = InvokerBuilder::<MockRemoteClient>::new().factory(MockClientFactory::new());
/// let chain = builder.build();
/// let builder = builder.add_logging();
/// ```
pub struct InvokerBuilder<C: RemoteClient> {
    factory: Option<Arc<dyn ClientFactory<C>>>,
    config: InvokerConfig,
    layers: Vec<Box<dyn InvokerLayer<C>>>,
}

impl<C: RemoteClient> InvokerBuilder<C> {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            factory: None,
            config: InvokerConfig::default(),
            layers: Vec::new(),
        }
    }

    /// Set the client factory
    pub fn factory(mut self, factory: impl ClientFactory<C> + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Set the configuration used by [`add_resilience`](Self::add_resilience)
    /// and [`add_configured_cache`](Self::add_configured_cache)
    pub fn config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add retry and per-attempt timeout using the builder's configuration
    pub fn add_resilience(self) -> Self {
        let config = self.config.resilience.clone();
        self.add_resilience_with(config)
    }

    /// Add retry and per-attempt timeout with an explicit configuration
    pub fn add_resilience_with(self, config: ResilienceConfig) -> Self {
        self.add_layer(ResilienceLayer::new(config))
    }

    /// Add start/success/failure logging
    pub fn add_logging(self) -> Self {
        self.add_layer(LoggingLayer::new())
    }

    /// Add logging that also records invocation metrics
    pub fn add_logging_with_metrics(self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.add_layer(LoggingLayer::new().with_metrics(metrics))
    }

    /// Add result caching in the process-wide store
    pub fn add_cache(self, ttl: Duration) -> Self {
        self.add_layer(CacheLayer::new(ttl))
    }

    /// Add result caching in the given store
    pub fn add_cache_with_store(self, ttl: Duration, store: Arc<dyn CacheStore>) -> Self {
        self.add_layer(CacheLayer::new(ttl).with_store(store))
    }

    /// Add result caching in the process-wide store using the configured TTL
    pub fn add_configured_cache(self) -> Self {
        let ttl = self.config.cache_ttl;
        self.add_cache(ttl)
    }

    /// Add result caching in the given store using the configured TTL
    pub fn add_configured_cache_in(self, store: Arc<dyn CacheStore>) -> Self {
        let ttl = self.config.cache_ttl;
        self.add_cache_with_store(ttl, store)
    }

    /// Add a caller-supplied decorator
    pub fn add_layer(mut self, layer: impl InvokerLayer<C> + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Build the chain.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Configuration`] if no factory was set.
    pub fn build(self) -> InvokeResult<InvokerChain<C>> {
        let factory = self.factory.ok_or_else(|| InvokerError::Configuration {
            message: "client factory is required".to_string(),
        })?;

        let mut root: SharedInvoker<C> = Arc::new(BaseInvoker::new(factory));
        for layer in self.layers.iter().rev() {
            root = layer.layer(root);
        }

        let layers = self.layers.iter().map(|l| l.name()).collect::<Vec<_>>();
        tracing::debug!(layers = ?layers, "invoker chain built");

        Ok(InvokerChain { root, layers })
    }
}

impl<C: RemoteClient> Default for InvokerBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable, built invoker chain.
///
/// Cheap to clone and safe to share across tasks: each call allocates its own
/// client.
pub struct InvokerChain<C: RemoteClient> {
    root: SharedInvoker<C>,
    layers: Vec<String>,
}

impl<C: RemoteClient> InvokerChain<C> {
    /// Start building a chain
    pub fn builder() -> InvokerBuilder<C> {
        InvokerBuilder::new()
    }

    /// Layer names, outermost first
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Run an operation that produces a value
    pub async fn invoke<T, F, Fut>(&self, f: F) -> InvokeResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<T>> + Send + 'static,
    {
        self.invoke_with_cancellation(f, &CancellationToken::new())
            .await
    }

    /// Run an operation that produces a value, stopping when `cancel` fires
    pub async fn invoke_with_cancellation<T, F, Fut>(
        &self,
        f: F,
        cancel: &CancellationToken,
    ) -> InvokeResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<T>> + Send + 'static,
    {
        let output = self
            .root
            .invoke(Operation::with_result(f), cancel.clone())
            .await?;
        downcast_output(output)
    }

    /// Run an operation for its side effects
    pub async fn execute<F, Fut>(&self, f: F) -> InvokeResult<()>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<()>> + Send + 'static,
    {
        self.execute_with_cancellation(f, &CancellationToken::new())
            .await
    }

    /// Run an operation for its side effects, stopping when `cancel` fires
    pub async fn execute_with_cancellation<F, Fut>(
        &self,
        f: F,
        cancel: &CancellationToken,
    ) -> InvokeResult<()>
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<()>> + Send + 'static,
    {
        self.root
            .invoke(Operation::without_result(f), cancel.clone())
            .await
            .map(|_| ())
    }
}

impl<C: RemoteClient> Clone for InvokerChain<C> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            layers: self.layers.clone(),
        }
    }
}

#[async_trait]
impl<C: RemoteClient> Invoker<C> for InvokerChain<C> {
    async fn invoke(
        &self,
        operation: Operation<C>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        self.root.invoke(operation, cancel).await
    }
}

fn downcast_output<T: Clone + Send + Sync + 'static>(output: Output) -> InvokeResult<T> {
    output
        .downcast::<T>()
        .map(|value| Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
        .map_err(|_| InvokerError::InvalidState {
            message: format!(
                "invocation did not produce a {}",
                std::any::type_name::<T>()
            ),
        })
}
