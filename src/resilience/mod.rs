//! Retry, backoff, and per-attempt timeout for invoker chains.

mod invoker;
mod retry;


pub use invoker::{ResilienceInvoker, ResilienceLayer, RetryPredicate};
pub use retry::{ResilienceConfig, RetryConfig, RetryContext, RetryDecision, RetryHook};
