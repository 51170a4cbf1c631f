use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Shared in-memory cache with per-entry TTL and LRU eviction.
///
/// Entries expire lazily: an expired entry is dropped on the read that finds
/// it. Readers and writers do not coordinate beyond the lock, so a stale
/// value written by a concurrent request can win.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    store: Arc<RwLock<LruCache<K, Entry<V>>>>,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Fallback when a zero capacity is requested; LruCache needs NonZeroUsize.
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(Self::DEFAULT_CAPACITY);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut store = self.store.write().await;
        let expired = match store.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            store.pop(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.store.write().await.push(key, entry);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_inserted_value_before_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new(10);
        cache
            .insert("key".to_string(), 42, Duration::from_secs(60))
            .await;
        assert_eq!(cache.get(&"key".to_string()).await, Some(42));
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let cache: TtlCache<String, u32> = TtlCache::new(10);
        cache
            .insert("key".to_string(), 42, Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&"key".to_string()).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2);
        cache.insert(1, 1, Duration::from_secs(60)).await;
        cache.insert(2, 2, Duration::from_secs(60)).await;
        cache.insert(3, 3, Duration::from_secs(60)).await;
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&3).await, Some(3));
    }

    #[tokio::test]
    async fn insert_overwrites_existing_key() {
        let cache: TtlCache<u32, u32> = TtlCache::new(10);
        cache.insert(1, 1, Duration::from_secs(60)).await;
        cache.insert(1, 2, Duration::from_secs(60)).await;
        assert_eq!(cache.get(&1).await, Some(2));
    }
}
