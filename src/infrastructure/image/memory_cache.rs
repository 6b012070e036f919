//! In-memory LRU cache of warmed image bodies.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Default maximum number of bodies kept in memory.
pub const DEFAULT_CACHE_SIZE: usize = 50;

/// Bounded LRU keyed by image address.
pub struct WarmCache {
    cache: RwLock<LruCache<String, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for WarmCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl WarmCache {
    /// Creates a cache holding at most `capacity` bodies (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a body, promoting it and counting a hit or miss.
    pub async fn get(&self, src: &str) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        if let Some(body) = cache.get(src) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(src = %src, "Warm cache hit");
            Some(body.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(src = %src, "Warm cache miss");
            None
        }
    }

    /// Checks presence without promoting or touching the stats.
    pub async fn contains(&self, src: &str) -> bool {
        self.cache.read().await.peek(src).is_some()
    }

    /// Stores a body, evicting the least recently used one when full.
    pub async fn put(&self, src: impl Into<String>, body: Bytes) {
        let src = src.into();
        debug!(src = %src, bytes = body.len(), "Storing warmed image");
        self.cache.write().await.put(src, body);
    }

    /// Drops every cached body.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        debug!("Cleared warm cache");
    }

    /// Best-effort entry count; reports zero while a writer holds the lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.try_read().map(|c| c.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for WarmCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached bodies.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Warm cache: {} images, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}
