//! Cache Store Module
//!
//! Concurrency wrapper giving a group exclusive, serialized access to its LRU cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::trace;

use crate::cache::{ByteView, CacheStats, LruCache};

struct Inner {
    lru: LruCache<ByteView>,
    stats: CacheStats,
}

// == Cache Store ==
/// A group's local cache.
///
/// Every read and write takes the same exclusive lock, since a hit reorders
/// the LRU list.
pub struct CacheStore {
    inner: Mutex<Inner>,
    evictions: Arc<AtomicU64>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_bytes` bytes (0 = unlimited).
    pub fn new(max_bytes: usize) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = evictions.clone();
        let lru = LruCache::new(max_bytes).with_eviction_callback(move |key: &str, _: &ByteView| {
            counter.fetch_add(1, Ordering::Relaxed);
            trace!("Evicted cache entry {}", key);
        });

        Self {
            inner: Mutex::new(Inner {
                lru,
                stats: CacheStats::new(),
            }),
            evictions,
        }
    }

    // == Get ==
    /// Looks a key up, recording a hit or a miss.
    pub async fn get(&self, key: &str) -> Option<ByteView> {
        let mut inner = self.inner.lock().await;
        match inner.lru.get(key).cloned() {
            Some(value) => {
                inner.stats.record_hit();
                Some(value)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Add ==
    /// Stores a value, evicting older entries if the budget is exceeded.
    pub async fn add(&self, key: &str, value: ByteView) {
        let mut inner = self.inner.lock().await;
        inner.lru.add(key.to_string(), value);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        let mut stats = inner.stats.clone();
        stats.evictions = self.evictions.load(Ordering::Relaxed);
        stats.total_entries = inner.lru.len();
        stats.bytes = inner.lru.bytes();
        stats.max_bytes = inner.lru.max_bytes();
        stats
    }

    /// Returns the current number of entries in the cache.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.lru.len()
    }
}
