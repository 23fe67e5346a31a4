use std::{
    fmt,
    hash::Hash,
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use lru::LruCache;

/// Bounded lru cache with an optional time-to-live applied per entry.
///
/// One shape serves every cache the rovers keep: the emitted-block dedup
/// cache (capacity ~1 resync window, 1 h ttl) and the announced-tx cache
/// (count-bounded, no ttl). Expired entries are dropped lazily on access.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, Entry<V>>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.inner.len())
            .field("cap", &self.inner.cap())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped above zero");
        Self {
            inner: LruCache::new(capacity),
            ttl,
        }
    }

    /// Inserts or refreshes an entry.
    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Looks an entry up, bumping its recency. Expired entries are removed
    /// and read as absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.is_expired(key) {
            self.inner.pop(key);
            return None;
        }
        self.inner.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    fn is_expired(&self, key: &K) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        self.inner
            .peek(key)
            .is_some_and(|entry| entry.inserted_at.elapsed() >= ttl)
    }
}
