//! Cache backend trait and usage counters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lamina_core::{BackendError, CacheEntry};

/// Write behavior when a key already holds a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace whatever is stored.
    #[default]
    Overwrite,
    /// Keep the existing entry; the write is a silent no-op.
    IfAbsent,
}

/// Storage tier for cache entries.
///
/// Implementations own deadline enforcement for the entries they store: an
/// expired entry must read as a miss even if it has not been physically
/// evicted yet. All operations are usable concurrently through a shared
/// reference.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the entry stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError>;

    /// Store `entry` under `key` according to `mode`.
    async fn set(&self, key: &str, entry: &CacheEntry, mode: WriteMode)
        -> Result<(), BackendError>;

    /// Remove the entry under `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), BackendError>;

    /// Re-arm a sliding entry's deadline to now plus its stored window.
    ///
    /// Each backend recovers the window from its own copy of the entry, so
    /// tiers holding different windows for the same key keep their own pace.
    /// A no-op for keys that are absent, expired, or absolute.
    async fn refresh_ttl(&self, key: &str) -> Result<(), BackendError>;

    /// Usage counters for this backend.
    async fn stats(&self) -> Result<CacheStats, BackendError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Current number of live entries.
    pub entry_count: u64,
    /// Approximate memory held by stored payloads, in bytes.
    pub memory_bytes: u64,
    /// Number of entries evicted, including lazy expiry.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate as a value between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
