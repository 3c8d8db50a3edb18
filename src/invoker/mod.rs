//! Invoker interface, operations, and chain composition.
//!
//! An [`Invoker`] runs an [`Operation`] against a remote client. The
//! [`BaseInvoker`] owns the client lifecycle; decorators (resilience, caching,
//! logging, or caller-supplied [`InvokerLayer`]s) each wrap exactly one inner
//! invoker. [`InvokerBuilder`] fixes the order once and produces an immutable
//! [`InvokerChain`].

mod base;
mod builder;

#[cfg(test)]
mod tests;

pub use base::BaseInvoker;
pub use builder::{layer_fn, InvokerBuilder, InvokerChain, InvokerLayer, LayerFn};

use crate::client::RemoteClient;
use crate::errors::InvokeResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Type-erased result of an operation.
///
/// Operations without a result produce `()`.
pub type Output = Arc<dyn Any + Send + Sync>;

type RunFn<C> = dyn Fn(Arc<C>) -> BoxFuture<'static, InvokeResult<Output>> + Send + Sync;

/// Whether an operation produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// The operation returns a value (eligible for caching)
    WithResult,
    /// The operation is run for its side effects only
    WithoutResult,
}

/// A caller-supplied unit of work against a remote client.
///
/// Operations are re-runnable: each retry attempt calls the same closure with
/// a different client.
pub struct Operation<C> {
    kind: OperationKind,
    output_type: TypeId,
    output_type_name: &'static str,
    run: Arc<RunFn<C>>,
}

impl<C: RemoteClient> Operation<C> {
    /// Creates an operation that produces a value of type `T`.
    pub fn with_result<T, F, Fut>(f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<T>> + Send + 'static,
    {
        Self {
            kind: OperationKind::WithResult,
            output_type: TypeId::of::<T>(),
            output_type_name: std::any::type_name::<T>(),
            run: Arc::new(move |client| {
                let fut = f(client);
                Box::pin(async move { fut.await.map(|value| Arc::new(value) as Output) })
            }),
        }
    }

    /// Creates an operation that produces nothing.
    ///
    /// It travels the same path as [`Operation::with_result`] with a `()` output.
    pub fn without_result<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult<()>> + Send + 'static,
    {
        Self {
            kind: OperationKind::WithoutResult,
            ..Self::with_result(f)
        }
    }

    /// Runs the operation against `client`.
    pub fn run(&self, client: Arc<C>) -> BoxFuture<'static, InvokeResult<Output>> {
        (self.run)(client)
    }
}

impl<C> Operation<C> {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns true if the operation produces a value.
    pub fn returns_value(&self) -> bool {
        self.kind == OperationKind::WithResult
    }

    /// Returns the `TypeId` of the value the operation produces.
    pub fn output_type(&self) -> TypeId {
        self.output_type
    }

    /// Returns the type name of the value the operation produces.
    pub fn output_type_name(&self) -> &'static str {
        self.output_type_name
    }
}

impl<C> Clone for Operation<C> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            output_type: self.output_type,
            output_type_name: self.output_type_name,
            run: self.run.clone(),
        }
    }
}

impl<C> fmt::Debug for Operation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("output", &self.output_type_name)
            .finish()
    }
}

/// Performs or forwards an invocation.
///
/// Implementations must be transparent to errors they do not handle: whatever
/// the inner invoker returns is passed back unchanged.
#[async_trait]
pub trait Invoker<C: RemoteClient>: Send + Sync {
    /// Invokes `operation`, honouring `cancel` at every suspension point.
    async fn invoke(&self, operation: Operation<C>, cancel: CancellationToken)
        -> InvokeResult<Output>;
}

/// Shared handle to an invoker.
pub type SharedInvoker<C> = Arc<dyn Invoker<C>>;
