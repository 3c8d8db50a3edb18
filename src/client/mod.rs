//! Remote client and client factory interfaces.
//!
//! A remote client is a handle to one stateful connection. The invocation
//! chain never shares a client: every attempt asks the factory for a new one
//! and tears it down before returning.

mod state;

pub use state::{ClientEvent, ClientState, ConnectionLifecycle};

use crate::errors::InvokeResult;
use async_trait::async_trait;

/// A handle to a stateful, connection-oriented remote service.
///
/// Implementations track their own [`ClientState`] (usually through an
/// embedded [`ConnectionLifecycle`]) so the base invoker can decide between a
/// graceful close and a forced abort.
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    /// Returns the current lifecycle state.
    fn state(&self) -> ClientState;

    /// Performs the connection handshake (`Created -> Opening -> Opened`).
    async fn open(&self) -> InvokeResult<()>;

    /// Gracefully shuts the connection down (`Opened -> Closed`).
    async fn close(&self) -> InvokeResult<()>;

    /// Forcibly tears the connection down. Never fails.
    fn abort(&self);
}

/// Creates brand-new remote clients on demand.
///
/// Each call must return a client with no connection history. Construction
/// failures are configuration problems and should be reported as
/// [`InvokerError::Configuration`](crate::errors::InvokerError::Configuration);
/// the base invoker reclassifies any other error a factory returns, so the
/// chain never retries them.
pub trait ClientFactory<C: RemoteClient>: Send + Sync {
    /// Creates a new client.
    fn create(&self) -> InvokeResult<C>;
}

impl<C, F> ClientFactory<C> for F
where
    C: RemoteClient,
    F: Fn() -> InvokeResult<C> + Send + Sync,
{
    fn create(&self) -> InvokeResult<C> {
        self()
    }
}

/// Returns the name used to identify a client type in logs and cache keys.
pub fn client_type_name<C: RemoteClient>() -> &'static str {
    std::any::type_name::<C>()
}
