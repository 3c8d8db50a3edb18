//! Process-wide key-value store backing the caching decorator.

use crate::invoker::Output;
use crate::DEFAULT_CACHE_CAPACITY;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Eviction priority of a cache entry.
///
/// When the store is over capacity, lower priorities are evicted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CachePriority {
    /// First to go
    Low,
    /// Default priority
    Normal,
    /// Kept as long as lower priorities can be evicted instead
    High,
    /// Never evicted for capacity, only on expiry
    NeverRemove,
}

/// Metadata stored alongside a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryOptions {
    /// Instant after which the entry is no longer served
    pub absolute_expiration: Instant,
    /// Eviction priority
    pub priority: CachePriority,
    /// Size hint counted against the store capacity
    pub size: usize,
}

/// Key-value store with entry lifetimes and eviction metadata.
///
/// Implementations must tolerate concurrent readers and writers.
pub trait CacheStore: Send + Sync {
    /// Get a live entry
    fn get(&self, key: &str) -> Option<Output>;

    /// Insert or replace an entry
    fn set(&self, key: &str, value: Output, options: CacheEntryOptions);

    /// Returns true if a live entry exists
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove an entry
    fn remove(&self, key: &str);
}

struct CacheEntry {
    value: Output,
    options: CacheEntryOptions,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.options.absolute_expiration
    }
}

static GLOBAL_STORE: Lazy<Arc<MemoryCacheStore>> =
    Lazy::new(|| Arc::new(MemoryCacheStore::with_capacity(DEFAULT_CACHE_CAPACITY)));

/// In-memory, size-bounded [`CacheStore`].
///
/// When the summed size of all entries exceeds the capacity, expired entries
/// are purged first, then the lowest-priority entries, oldest first.
/// [`CachePriority::NeverRemove`] entries are only removed on expiry.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl MemoryCacheStore {
    /// Create an empty store holding at most `capacity` size units
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// The shared, process-wide store
    pub fn global() -> Arc<MemoryCacheStore> {
        GLOBAL_STORE.clone()
    }

    /// Number of entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Summed size of all entries
    pub fn size(&self) -> usize {
        self.entries.read().values().map(|e| e.options.size).sum()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn compact(entries: &mut HashMap<String, CacheEntry>, capacity: usize, now: Instant) {
        let mut size: usize = entries.values().map(|e| e.options.size).sum();
        if size <= capacity {
            return;
        }

        entries.retain(|_, e| !e.is_expired(now));
        size = entries.values().map(|e| e.options.size).sum();

        let mut candidates: Vec<(CachePriority, Instant, String)> = entries
            .iter()
            .filter(|(_, e)| e.options.priority != CachePriority::NeverRemove)
            .map(|(k, e)| (e.options.priority, e.inserted_at, k.clone()))
            .collect();
        candidates.sort();

        for (priority, _, key) in candidates {
            if size <= capacity {
                break;
            }
            if let Some(evicted) = entries.remove(&key) {
                size -= evicted.options.size;
                tracing::debug!(key = %key, ?priority, "evicted cache entry");
            }
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<Output> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Entry has expired, remove it
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    fn set(&self, key: &str, value: Output, options: CacheEntryOptions) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                options,
                inserted_at: now,
            },
        );
        Self::compact(&mut entries, self.capacity, now);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}
