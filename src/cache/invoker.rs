use crate::cache::store::{CacheEntryOptions, CachePriority, CacheStore, MemoryCacheStore};
use crate::client::{client_type_name, RemoteClient};
use crate::errors::InvokeResult;
use crate::invoker::{Invoker, InvokerLayer, Operation, Output, SharedInvoker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decorator caching the last successful result per client type.
///
/// The cache key is the client type name, not the operation: every
/// result-producing call through chains for the same client type shares one
/// entry. A cached value whose type differs from what the operation produces
/// counts as a miss and is overwritten. Operations without a result always go
/// to the inner invoker and never touch the cache.
pub struct CachingInvoker<C: RemoteClient> {
    inner: SharedInvoker<C>,
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    key: String,
}

impl<C: RemoteClient> CachingInvoker<C> {
    /// Create a caching decorator around `inner`
    pub fn new(inner: SharedInvoker<C>, store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            inner,
            store,
            ttl,
            key: client_type_name::<C>().to_string(),
        }
    }

    /// The key this decorator reads and writes
    pub fn key(&self) -> &str {
        &self.key
    }

    fn lookup(&self, operation: &Operation<C>) -> Option<Output> {
        let cached = self.store.get(&self.key)?;
        if (*cached).type_id() == operation.output_type() {
            Some(cached)
        } else {
            debug!(
                key = %self.key,
                expected = operation.output_type_name(),
                "cached value has a different type, ignoring"
            );
            None
        }
    }
}

#[async_trait]
impl<C: RemoteClient> Invoker<C> for CachingInvoker<C> {
    async fn invoke(
        &self,
        operation: Operation<C>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        if !operation.returns_value() {
            return self.inner.invoke(operation, cancel).await;
        }

        if let Some(cached) = self.lookup(&operation) {
            debug!(key = %self.key, "cache hit");
            return Ok(cached);
        }
        debug!(key = %self.key, "cache miss");

        let output = self.inner.invoke(operation, cancel).await?;
        self.store.set(
            &self.key,
            output.clone(),
            CacheEntryOptions {
                absolute_expiration: Instant::now() + self.ttl,
                priority: CachePriority::High,
                size: 1,
            },
        );
        debug!(key = %self.key, ttl_ms = self.ttl.as_millis() as u64, "cached result");

        Ok(output)
    }
}

/// Layer producing a [`CachingInvoker`].
#[derive(Clone)]
pub struct CacheLayer {
    ttl: Duration,
    store: Option<Arc<dyn CacheStore>>,
}

impl CacheLayer {
    /// Cache results for `ttl` in the process-wide store
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, store: None }
    }

    /// Use `store` instead of the process-wide store
    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl<C: RemoteClient> InvokerLayer<C> for CacheLayer {
    fn name(&self) -> String {
        "cache".to_string()
    }

    fn layer(&self, inner: SharedInvoker<C>) -> SharedInvoker<C> {
        let store = self
            .store
            .clone()
            .unwrap_or_else(|| MemoryCacheStore::global() as Arc<dyn CacheStore>);
        Arc::new(CachingInvoker::new(inner, store, self.ttl))
    }
}
