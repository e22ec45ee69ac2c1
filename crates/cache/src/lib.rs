//! Cache crate
//!
//! Provides a thread-safe, in-memory key-value cache with an optional entry
//! limit and time-to-live. Lookup joins keep the rows fetched for a key here
//! so repeated probes do not go back to the table store.

use moka::future::Cache as MokaCache;
use std::time::Duration;
use tracing::debug;

/// A thread-safe, in-memory cache.
///
/// Stores cloned values. Keys are Strings. Past `max_entries` the least
/// valuable entries are evicted; entries older than the time-to-live are
/// treated as absent.
pub struct Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: MokaCache<String, V>,
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new, empty and unbounded cache.
    pub fn new() -> Self {
        Self::with_limits(None, None)
    }

    /// Creates a cache holding at most `max_entries` values, each for at
    /// most `ttl`.
    pub fn with_limits(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder();
        if let Some(max) = max_entries {
            builder = builder.max_capacity(max as u64);
        }
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        debug!("Cache built with max_entries={:?}, ttl={:?}", max_entries, ttl);
        Self { inner: builder.build() }
    }

    /// Retrieves a clone of the value associated with the given key.
    ///
    /// Returns `None` if the key is not found or has expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    /// Inserts a key-value pair into the cache.
    ///
    /// If the key already exists, the old value is overwritten.
    pub async fn put(&self, key: String, value: V) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Number of live entries, after pending evictions have been applied.
    pub async fn len(&self) -> usize {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
