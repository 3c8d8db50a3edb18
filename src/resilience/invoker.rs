use crate::client::{client_type_name, RemoteClient};
use crate::errors::{InvokeResult, InvokerError};
use crate::invoker::{Invoker, InvokerLayer, Operation, Output, SharedInvoker};
use crate::resilience::retry::{ResilienceConfig, RetryContext, RetryDecision, RetryHook};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Classifies which failures are worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&InvokerError) -> bool + Send + Sync>;

/// Decorator adding bounded retries with exponential backoff and a
/// per-attempt timeout.
///
/// Each attempt goes through the inner chain again, so every retry runs
/// against a brand-new client. After the budget is exhausted the error of the
/// last attempt is returned unchanged.
pub struct ResilienceInvoker<C: RemoteClient> {
    inner: SharedInvoker<C>,
    config: ResilienceConfig,
    predicate: RetryPredicate,
    hook: Option<Arc<dyn RetryHook>>,
}

impl<C: RemoteClient> ResilienceInvoker<C> {
    /// Create a new resilience decorator around `inner`
    pub fn new(inner: SharedInvoker<C>, config: ResilienceConfig) -> Self {
        Self {
            inner,
            config,
            predicate: Arc::new(InvokerError::is_retryable),
            hook: None,
        }
    }

    /// Replace the retryable-failure predicate
    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Add a retry hook for custom retry logic
    pub fn with_hook(mut self, hook: Arc<dyn RetryHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Runs one attempt under the per-attempt deadline.
    ///
    /// On expiry the attempt's token is cancelled and the inner chain gets
    /// `teardown_grace` to tear its client down. Past that the attempt is
    /// dropped, which aborts the client.
    async fn attempt(
        &self,
        operation: Operation<C>,
        cancel: &CancellationToken,
    ) -> InvokeResult<Output> {
        let attempt_token = cancel.child_token();
        let timeout = self.config.attempt_timeout;

        let attempt = self.inner.invoke(operation, attempt_token.clone());
        tokio::pin!(attempt);

        tokio::select! {
            result = &mut attempt => return result,
            _ = sleep(timeout) => attempt_token.cancel(),
        }

        let client = client_type_name::<C>();
        match tokio::time::timeout(self.config.teardown_grace, attempt).await {
            Ok(Ok(output)) => return Ok(output),
            Ok(Err(_)) if cancel.is_cancelled() => return Err(InvokerError::Cancelled),
            Ok(Err(_)) => {}
            Err(_) => warn!(
                client,
                grace_ms = self.config.teardown_grace.as_millis() as u64,
                "timed-out attempt did not finish teardown, dropping it"
            ),
        }

        warn!(client, timeout_ms = timeout.as_millis() as u64, "attempt timed out");
        Err(InvokerError::Timeout {
            message: format!("attempt against {} exceeded its deadline", client),
            timeout,
        })
    }

    async fn delay_before_retry(
        &self,
        attempt: u32,
        error: &InvokerError,
    ) -> Option<Duration> {
        let delay = self.config.retry.backoff_for(attempt);

        let Some(hook) = &self.hook else {
            return Some(delay);
        };

        let context = RetryContext {
            attempt,
            error: error.clone(),
            delay,
            client: client_type_name::<C>(),
        };
        match hook.on_retry(context).await {
            RetryDecision::Default => Some(delay),
            RetryDecision::Retry(custom) => Some(custom),
            RetryDecision::Abort => None,
        }
    }
}

#[async_trait]
impl<C: RemoteClient> Invoker<C> for ResilienceInvoker<C> {
    async fn invoke(
        &self,
        operation: Operation<C>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        let client = client_type_name::<C>();
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.attempt(operation.clone(), &cancel).await {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            if cancel.is_cancelled() || !(self.predicate)(&error) {
                return Err(error);
            }

            if attempt >= max_attempts {
                error!(client, attempts = attempt, error = %error, "retry budget exhausted");
                return Err(error);
            }

            let Some(delay) = self.delay_before_retry(attempt, &error).await else {
                warn!(client, attempt, error = %error, "retry aborted by hook");
                return Err(error);
            };

            warn!(
                client,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying remote client invocation"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(InvokerError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }
}

/// Layer producing a [`ResilienceInvoker`].
#[derive(Clone)]
pub struct ResilienceLayer {
    config: ResilienceConfig,
    predicate: Option<RetryPredicate>,
    hook: Option<Arc<dyn RetryHook>>,
}

impl ResilienceLayer {
    /// Create a layer with the given configuration
    pub fn new(config: ResilienceConfig) -> Self {
        Self {
            config,
            predicate: None,
            hook: None,
        }
    }

    /// Replace the retryable-failure predicate
    pub fn with_retry_predicate(
        mut self,
        predicate: impl Fn(&InvokerError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Add a retry hook
    pub fn with_hook(mut self, hook: Arc<dyn RetryHook>) -> Self {
        self.hook = Some(hook);
        self
    }
}

impl Default for ResilienceLayer {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl<C: RemoteClient> InvokerLayer<C> for ResilienceLayer {
    fn name(&self) -> String {
        "resilience".to_string()
    }

    fn layer(&self, inner: SharedInvoker<C>) -> SharedInvoker<C> {
        let mut invoker = ResilienceInvoker::new(inner, self.config.clone());
        if let Some(predicate) = &self.predicate {
            invoker = invoker.with_predicate(predicate.clone());
        }
        if let Some(hook) = &self.hook {
            invoker = invoker.with_hook(hook.clone());
        }
        Arc::new(invoker)
    }
}
