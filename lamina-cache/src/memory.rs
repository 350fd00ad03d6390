//! In-process cache tier.
//!
//! A bounded-lifetime key-value store held entirely in process memory. Expiry
//! is enforced lazily on read: an entry past its deadline reads as a miss and
//! is dropped on the spot. A periodic sweep ([`run_purge_task`]) reclaims
//! entries nobody reads anymore.
//!
//! Sliding entries track their own deadline here. Every successful read
//! re-arms the deadline to now plus the entry's original window, independent
//! of whatever the remote tier does.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use lamina_core::{deadline_after, BackendError, CacheEntry, CacheKey, PurgeConfig, Timestamp};

use crate::backend::{CacheBackend, CacheStats, WriteMode};

/// One stored envelope plus its current deadline.
///
/// The slot deadline starts as the envelope's `expires_at` and moves forward
/// on access for sliding entries; the envelope itself keeps the deadline from
/// write time.
#[derive(Debug, Clone)]
struct LocalSlot {
    entry: CacheEntry,
    deadline: Option<Timestamp>,
}

impl LocalSlot {
    fn new(entry: CacheEntry) -> Self {
        let deadline = entry.expires_at;
        Self { entry, deadline }
    }

    fn is_expired(&self, now: Timestamp) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    fn touch(&mut self, now: Timestamp) {
        if let Some(window) = self.entry.sliding_window {
            self.deadline = deadline_after(now, window);
        }
    }
}

/// In-process cache backend.
pub struct MemoryBackend {
    entries: RwLock<HashMap<CacheKey, LocalSlot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Drop every entry whose deadline has passed. Returns how many were
    /// removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, slot| !slot.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        match entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.remove();
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                } else {
                    let slot = occupied.into_mut();
                    slot.touch(now);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(slot.entry.clone()))
                }
            }
            Entry::Vacant(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        entry: &CacheEntry,
        mode: WriteMode,
    ) -> Result<(), BackendError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if mode == WriteMode::IfAbsent {
            if let Some(existing) = entries.get(key) {
                if !existing.is_expired(now) {
                    return Ok(());
                }
            }
        }
        entries.insert(key.to_string(), LocalSlot::new(entry.clone()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn refresh_ttl(&self, key: &str) -> Result<(), BackendError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if let Some(slot) = entries.get_mut(key) {
            if !slot.is_expired(now) {
                slot.touch(now);
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, BackendError> {
        let entries = self.entries.read().await;
        let memory_bytes = entries
            .values()
            .map(|slot| slot.entry.payload.len() as u64)
            .sum();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            memory_bytes,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

// ============================================================================
// BACKGROUND PURGE TASK
// ============================================================================

/// Periodically sweep expired entries out of a [`MemoryBackend`].
///
/// Runs until `shutdown_rx` signals `true` or its sender is dropped. Returns
/// the total number of entries purged over the task's lifetime.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
/// let handle = tokio::spawn(run_purge_task(backend, PurgeConfig::default(), shutdown_rx));
///
/// // ... later, during shutdown:
/// shutdown_tx.send(true)?;
/// let purged = handle.await?;
/// ```
pub async fn run_purge_task(
    backend: Arc<MemoryBackend>,
    config: PurgeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> u64 {
    let mut sweep_interval = interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Cache purge task started"
    );

    let mut total_purged = 0u64;
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache purge task shutting down");
                    break;
                }
            }
            _ = sweep_interval.tick() => {
                let removed = backend.purge_expired().await;
                if removed > 0 {
                    tracing::debug!(removed, "Purged expired cache entries");
                }
                total_purged += removed as u64;
            }
        }
    }

    tracing::info!(total_purged, "Cache purge task completed");
    total_purged
}

// ============================================================================
// TESTS
// ============================================================================
