//! Result caching.
//!
//! Provides a process-wide, size-bounded store and the decorator that serves
//! repeated result-producing invocations from it.

mod invoker;
mod store;

pub use invoker::{CacheLayer, CachingInvoker};
pub use store::{CacheEntryOptions, CachePriority, CacheStore, MemoryCacheStore};
