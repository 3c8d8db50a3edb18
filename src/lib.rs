//! # Client Invoker
//!
//! Runs operations against stateful remote clients through a composable chain
//! of decorators.
//!
//! Every invocation gets a brand-new client from a factory. The client is
//! opened, used once, and then closed or aborted depending on the state it was
//! left in, so no client survives its invocation. Cross-cutting behavior is
//! layered on top:
//!
//! - Resilience: bounded retries with exponential backoff and a per-attempt
//!   timeout, each attempt on a fresh client
//! - Caching: the last successful result per client type, with a lifetime
//! - Logging: structured start/success/failure events and optional metrics
//! - Custom decorators through [`InvokerLayer`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_client_invoker::mocks::{MockClientFactory, MockRemoteClient};
//! use integrations_client_invoker::InvokerChain;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = InvokerChain::<MockRemoteClient>::builder()
//!         .factory(MockClientFactory::new())
//!         .add_resilience()
//!         .add_logging()
//!         .build()?;
//!
//!     let answer = chain
//!         .invoke(|client: Arc<MockRemoteClient>| async move { client.call(42u32).await })
//!         .await?;
//!     assert_eq!(answer, 42);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `client` - Remote client contract, lifecycle states and factories
//! - `invoker` - Operations, the invoker trait, the base invoker and the builder
//! - `resilience` - Retry and timeout decorator
//! - `cache` - Result cache store and decorator
//! - `observability` - Logging configuration, metrics and the logging decorator
//! - `config` - Chain configuration and environment overrides
//! - `errors` - Error types and taxonomy
//! - `mocks` - Scriptable clients and log capture for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod invoker;
pub mod mocks;
pub mod observability;
pub mod resilience;

pub use cache::{CacheLayer, CacheStore, MemoryCacheStore};
pub use client::{ClientEvent, ClientFactory, ClientState, ConnectionLifecycle, RemoteClient};
pub use config::{InvokerConfig, InvokerConfigBuilder};
pub use errors::{ErrorCategory, InvokeResult, InvokerError};
pub use invoker::{
    layer_fn, BaseInvoker, Invoker, InvokerBuilder, InvokerChain, InvokerLayer, Operation,
    OperationKind, Output, SharedInvoker,
};
pub use observability::{
    InMemoryMetricsCollector, LogFormat, LogLevel, LoggingConfig, LoggingLayer, MetricsCollector,
    NoopMetricsCollector,
};
pub use resilience::{
    ResilienceConfig, ResilienceLayer, RetryConfig, RetryContext, RetryDecision, RetryHook,
};

/// Default number of attempts, including the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default upper bound for a single retry delay, in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default deadline for a single attempt, in seconds
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 15;

/// Default time a timed-out attempt may spend closing its client, in seconds
pub const DEFAULT_TEARDOWN_GRACE_SECS: u64 = 5;

/// Default lifetime of a cached result, in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Default capacity of the process-wide cache store, in size units
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
