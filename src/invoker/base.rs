use crate::client::{client_type_name, ClientFactory, ClientState, RemoteClient};
use crate::errors::{InvokeResult, InvokerError};
use crate::invoker::{Invoker, Operation, Output};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Innermost invoker: owns the lifecycle of one client per invocation.
///
/// Every call creates a client through the factory, opens it if it is still
/// `Created`, runs the operation, then closes or aborts it depending on the
/// state it was left in. The client is dropped before `invoke` returns.
pub struct BaseInvoker<C: RemoteClient> {
    factory: Arc<dyn ClientFactory<C>>,
}

impl<C: RemoteClient> BaseInvoker<C> {
    /// Create a new base invoker backed by `factory`
    pub fn new(factory: Arc<dyn ClientFactory<C>>) -> Self {
        Self { factory }
    }

    fn create_client(&self) -> InvokeResult<Arc<C>> {
        match self.factory.create() {
            Ok(client) => Ok(Arc::new(client)),
            Err(e @ InvokerError::Configuration { .. }) => Err(e),
            Err(other) => Err(InvokerError::Configuration {
                message: format!("client factory failed: {}", other),
            }),
        }
    }

    async fn run_attempt(
        client: &Arc<C>,
        operation: &Operation<C>,
        cancel: &CancellationToken,
    ) -> InvokeResult<Output> {
        if client.state() == ClientState::Created {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InvokerError::Cancelled),
                opened = client.open() => opened?,
            }
            debug!(client = client_type_name::<C>(), "client opened");
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvokerError::Cancelled),
            result = operation.run(client.clone()) => result,
        }
    }
}

#[async_trait]
impl<C: RemoteClient> Invoker<C> for BaseInvoker<C> {
    async fn invoke(
        &self,
        operation: Operation<C>,
        cancel: CancellationToken,
    ) -> InvokeResult<Output> {
        let guard = TeardownGuard::new(self.create_client()?);

        let result = Self::run_attempt(guard.client(), &operation, &cancel).await;
        teardown(guard.client().as_ref()).await;
        guard.disarm();

        result
    }
}

/// Aborts the client if the invocation future is dropped before teardown
/// completed.
struct TeardownGuard<C: RemoteClient> {
    client: Arc<C>,
    armed: bool,
}

impl<C: RemoteClient> TeardownGuard<C> {
    fn new(client: Arc<C>) -> Self {
        Self {
            client,
            armed: true,
        }
    }

    fn client(&self) -> &Arc<C> {
        &self.client
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<C: RemoteClient> Drop for TeardownGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let state = self.client.state();
        if state != ClientState::Closed {
            warn!(
                client = client_type_name::<C>(),
                %state,
                "invocation dropped before teardown, aborting client"
            );
            self.client.abort();
        }
    }
}
