// In-memory response cache with LRU capacity and TTL expiry
// Author: kelexine (https://github.com/kelexine)

use super::{CacheConfig, CacheEntry, CacheKey, CacheStats};
use crate::models::GenerateContentResponse;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

struct CacheState<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    stats: CacheStats,
}

/// Thread-safe cache of unary responses.
///
/// Concurrent `get`/`set` are serialized by one short, non-async lock;
/// the last write for a key wins. A miss followed by a store is not atomic,
/// so two concurrent identical requests may both reach the network.
/// Cloning shares the same store.
pub struct ResponseCache<V = GenerateContentResponse> {
    config: CacheConfig,
    state: Arc<Mutex<CacheState<V>>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            })),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a live entry, dropping it if its TTL has elapsed.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let mut state = self.state.lock();

        let lookup = state.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match lookup {
            Some(Some(value)) => {
                state.stats.hits += 1;
                drop(state);
                debug!("Cache hit: {}", key.short());
                crate::metrics::record_cache_operation("hit");
                Some(value)
            }
            Some(None) => {
                state.entries.pop(key);
                state.stats.expirations += 1;
                state.stats.misses += 1;
                drop(state);
                debug!("Cache entry expired: {}", key.short());
                crate::metrics::record_cache_operation("expire");
                crate::metrics::record_cache_operation("miss");
                None
            }
            None => {
                state.stats.misses += 1;
                drop(state);
                debug!("Cache miss: {}", key.short());
                crate::metrics::record_cache_operation("miss");
                None
            }
        }
    }

    /// Store a value, evicting the least recently used entry at capacity.
    pub fn set(&self, key: CacheKey, value: V) {
        if !self.config.enabled {
            return;
        }

        let now = Instant::now();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            inserted_at: now,
            expires_at: now + self.config.ttl,
        };

        let mut state = self.state.lock();
        let evicted = state.entries.push(key.clone(), entry);
        state.stats.inserts += 1;
        // `push` returns the replaced entry for the same key too; only count
        // displacement of a different key as an eviction.
        let was_evicted = matches!(&evicted, Some((old_key, _)) if *old_key != key);
        if was_evicted {
            state.stats.evictions += 1;
        }
        drop(state);

        crate::metrics::record_cache_operation("insert");
        if was_evicted {
            crate::metrics::record_cache_operation("evict");
        }
        debug!("Cached response: {}", key.short());
    }

    /// Remove one entry; returns whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.pop(key).is_some()
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        state.stats.expirations += expired.len() as u64;
        expired.len()
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.state.lock().entries.clear();
        debug!("Cache cleared");
    }

    /// Number of stored entries, including any not yet purged after expiry.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }
}
