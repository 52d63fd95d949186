//! Cache configuration, entry and statistics models.

// Author: kelexine (https://github.com/kelexine)

use super::CacheKey;
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// How long an entry stays valid after insertion.
    pub ttl: Duration,
    /// Maximum number of entries; least recently used entries are evicted first.
    pub max_entries: usize,
}

impl CacheConfig {
    /// Caching switched off; every lookup misses.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Small, short-lived cache for interactive use.
    pub fn short_lived() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(60),
            max_entries: 50,
        }
    }

    /// Large, long-lived cache for production workloads.
    pub fn long_lived() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            max_entries: 1000,
        }
    }
}

impl Default for CacheConfig {
    /// - `enabled`: true
    /// - `ttl`: 300 seconds
    /// - `max_entries`: 100
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            max_entries: 100,
        }
    }
}

/// A cached value with its validity window.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub value: V,
    pub inserted_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Entries dropped to make room at capacity.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
