//! Bounded LRU result cache with TTL expiry

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Deterministic digest of (normalized text, source, target)
///
/// Equal inputs always produce equal keys; texts are normalized by trimming
/// surrounding whitespace before hashing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key for a translation lookup
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.trim().as_bytes());
        hasher.update(&[0]);
        hasher.update(source_lang.as_bytes());
        hasher.update(&[0]);
        hasher.update(target_lang.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: String = self.0[..6].iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "CacheKey({}…)", hex)
    }
}

/// A cached translation; value type owned exclusively by the cache
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    last_accessed_at: Instant,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing (or only an expired entry)
    pub misses: u64,
    /// Successful insertions
    pub insertions: u64,
    /// Entries displaced by capacity pressure
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of live entries
    pub size: usize,
}

impl CacheStats {
    /// Hit ratio over all lookups so far
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheInner {
    map: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
    expirations: u64,
}

/// Bounded LRU cache for translation results
///
/// One instance is shared across all concurrent requests for the process
/// lifetime. All mutations, including the LRU-order updates caused by
/// reads, run under a single writer lock.
pub struct ResultCache {
    inner: RwLock<CacheInner>,
    ttl: Option<Duration>,
}

impl ResultCache {
    /// Create a cache with fixed capacity and optional TTL
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(CacheInner {
                map: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                insertions: 0,
                evictions: 0,
                expirations: 0,
            }),
            ttl: ttl.filter(|d| !d.is_zero()),
        }
    }

    /// Look up a translation; expired entries are removed and count as misses
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let mut inner = self.inner.write().await;

        // Peek first so an expired entry never gets its recency refreshed
        let expired = match inner.map.peek(key) {
            Some(entry) => match self.ttl {
                Some(ttl) => entry.inserted_at.elapsed() > ttl,
                None => false,
            },
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            inner.map.pop(key);
            inner.expirations += 1;
            inner.misses += 1;
            return None;
        }

        match inner.map.get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = Instant::now();
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a translation, evicting the least-recently-accessed entry if full
    pub async fn set(&self, key: CacheKey, value: String) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            inserted_at: now,
            last_accessed_at: now,
        };

        let mut inner = self.inner.write().await;
        if let Some((displaced, _)) = inner.map.push(key, entry) {
            // push returns the previous entry when the key already existed;
            // only a different key means capacity eviction
            if displaced != key {
                inner.evictions += 1;
            }
        }
        inner.insertions += 1;
    }

    /// Current number of live entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Statistics snapshot
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            insertions: inner.insertions,
            evictions: inner.evictions,
            expirations: inner.expirations,
            size: inner.map.len(),
        }
    }

    /// Drop all entries, keeping counters
    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }
}
