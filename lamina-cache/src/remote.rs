//! Remote store session trait and the backend adapter over it.
//!
//! The session ([`RemoteStore`]) is the expensive long-lived resource: opened
//! once at process scope and shared, never re-established per call. It speaks
//! raw bytes and store-level TTLs. [`RemoteBackend`] adapts that session to
//! the [`CacheBackend`] contract by translating entry envelopes to byte blobs
//! and deriving store TTLs from envelope deadlines. A deadline refresh reads
//! the stored envelope back to recover its sliding window before resetting
//! the store TTL. The adapter adds no retry and no classification of its own;
//! failures pass through carrying the store's failure code.
//!
//! [`MemoryRemoteStore`] is a session stand-in for tests and local
//! development, with scriptable failures per operation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use lamina_core::{deadline_after, BackendError, CacheEntry, FailureCode, Timestamp};

use crate::backend::{CacheBackend, CacheStats, WriteMode};

// ============================================================================
// SESSION CONTRACT
// ============================================================================

/// Error raised by a remote store session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Remote store failure ({code:?}): {message}")]
pub struct RemoteStoreError {
    /// Failure code in the classifier's vocabulary.
    pub code: FailureCode,
    /// Description from the store client.
    pub message: String,
}

impl RemoteStoreError {
    /// Create a store error with an explicit code.
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<RemoteStoreError> for BackendError {
    fn from(error: RemoteStoreError) -> Self {
        BackendError::new(error.code, error.message)
    }
}

/// A long-lived session against a remote key-value store with TTL support.
///
/// Implementations map their client's failure taxonomy onto [`FailureCode`]
/// and do nothing else: no retries, no envelope knowledge.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError>;

    /// Store raw bytes under `key` with an optional time-to-live.
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        mode: WriteMode,
    ) -> Result<(), RemoteStoreError>;

    /// Remove `key`. Removing an absent key must succeed.
    async fn remove(&self, key: &str) -> Result<(), RemoteStoreError>;

    /// Reset the time-to-live for `key` to `ttl` from now.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RemoteStoreError>;
}

// ============================================================================
// BACKEND ADAPTER
// ============================================================================

/// [`CacheBackend`] adapter over a remote store session.
pub struct RemoteBackend {
    store: Arc<dyn RemoteStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RemoteBackend {
    /// Wrap a shared store session.
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl CacheBackend for RemoteBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        let bytes = match self.store.get(key).await? {
            Some(bytes) => bytes,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        match CacheEntry::decode(&bytes) {
            Ok(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry))
            }
            Err(error) => {
                // An undecodable blob is treated as a miss, not a store
                // failure: retrying cannot fix it, reloading can.
                tracing::warn!(key = %key, error = %error, "Discarding undecodable cache envelope");
                if let Err(remove_error) = self.store.remove(key).await {
                    tracing::debug!(
                        key = %key,
                        error = %remove_error,
                        "Could not remove undecodable cache envelope"
                    );
                }
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
        let bytes = entry.encode().map_err(|error| {
            BackendError::internal(format!("cache envelope could not be encoded: {}", error))
        })?;
        let ttl = entry.time_to_live(Utc::now());
        self.store.set(key, bytes, ttl, mode).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.store.remove(key).await?;
        Ok(())
    }

    async fn refresh_ttl(&self, key: &str) -> Result<(), BackendError> {
        // Raw session read: nothing is served here, so the hit and miss
        // counters stay untouched.
        let bytes = match self.store.get(key).await? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };
        match CacheEntry::decode(&bytes) {
            Ok(entry) => {
                if let Some(window) = entry.sliding_window {
                    self.store.expire(key, window).await?;
                }
                Ok(())
            }
            Err(error) => {
                // The next real read discards the undecodable blob; there is
                // nothing worth re-arming here.
                tracing::debug!(key = %key, error = %error, "Skipping deadline refresh for undecodable envelope");
                Ok(())
            }
        }
    }

    /// Counters as observed through this adapter. The store itself is not
    /// consulted, so entry and memory counts are unknown and reported as
    /// zero.
    async fn stats(&self) -> Result<CacheStats, BackendError> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..Default::default()
        })
    }
}

// ============================================================================
// IN-MEMORY SESSION
// ============================================================================

/// Remote store operations, used to target scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Set,
    Remove,
    Expire,
}

#[derive(Debug, Clone)]
struct FailureScript {
    code: FailureCode,
    only: Option<StoreOp>,
    /// `None` fails every call until cleared.
    remaining: Option<u32>,
}

#[derive(Debug)]
struct StoredValue {
    value: Vec<u8>,
    deadline: Option<Timestamp>,
}

impl StoredValue {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.deadline.map_or(false, |deadline| now >= deadline)
    }
}

/// In-memory [`RemoteStore`] with deadline enforcement and scriptable
/// failures.
///
/// Used as the session for tests and local development. Failures can be
/// injected for the next N calls, forever, or for a single operation kind,
/// which is how retry and failover behavior gets exercised without a real
/// store outage.
pub struct MemoryRemoteStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    script: Mutex<Option<FailureScript>>,
    gets: AtomicU64,
    sets: AtomicU64,
    removes: AtomicU64,
    expires: AtomicU64,
}

impl MemoryRemoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            script: Mutex::new(None),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            expires: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` operations with `code`.
    pub fn fail_next(&self, n: u32, code: FailureCode) {
        *self.script.lock().unwrap() = Some(FailureScript {
            code,
            only: None,
            remaining: Some(n),
        });
    }

    /// Fail every operation with `code` until [`Self::clear_failures`].
    pub fn fail_always(&self, code: FailureCode) {
        *self.script.lock().unwrap() = Some(FailureScript {
            code,
            only: None,
            remaining: None,
        });
    }

    /// Fail the next `n` operations of kind `op` with `code`; other
    /// operations pass through.
    pub fn fail_op(&self, op: StoreOp, n: u32, code: FailureCode) {
        *self.script.lock().unwrap() = Some(FailureScript {
            code,
            only: Some(op),
            remaining: Some(n),
        });
    }

    /// Drop any active failure script.
    pub fn clear_failures(&self) {
        *self.script.lock().unwrap() = None;
    }

    /// Number of `get` calls seen, including failed ones.
    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `set` calls seen, including failed ones.
    pub fn set_calls(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// Number of `remove` calls seen, including failed ones.
    pub fn remove_calls(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Number of `expire` calls seen, including failed ones.
    pub fn expire_calls(&self) -> u64 {
        self.expires.load(Ordering::Relaxed)
    }

    /// Number of entries currently stored, expired or not.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    fn scripted_failure(&self, op: StoreOp) -> Option<RemoteStoreError> {
        let mut guard = self.script.lock().unwrap();
        let spent = match guard.as_mut() {
            None => return None,
            Some(script) => {
                if script.only.map_or(false, |only| only != op) {
                    return None;
                }
                match &mut script.remaining {
                    None => {
                        return Some(RemoteStoreError::new(script.code, "scripted failure"));
                    }
                    Some(0) => true,
                    Some(remaining) => {
                        *remaining -= 1;
                        return Some(RemoteStoreError::new(script.code, "scripted failure"));
                    }
                }
            }
        };
        if spent {
            *guard = None;
        }
        None
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.scripted_failure(StoreOp::Get) {
            return Err(error);
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        match entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.remove();
                    Ok(None)
                } else {
                    Ok(Some(occupied.get().value.clone()))
                }
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        mode: WriteMode,
    ) -> Result<(), RemoteStoreError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.scripted_failure(StoreOp::Set) {
            return Err(error);
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if mode == WriteMode::IfAbsent {
            if let Some(existing) = entries.get(key) {
                if !existing.is_expired(now) {
                    return Ok(());
                }
            }
        }
        let deadline = ttl.and_then(|ttl| deadline_after(now, ttl));
        entries.insert(key.to_string(), StoredValue { value, deadline });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RemoteStoreError> {
        self.removes.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.scripted_failure(StoreOp::Remove) {
            return Err(error);
        }

        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RemoteStoreError> {
        self.expires.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.scripted_failure(StoreOp::Expire) {
            return Err(error);
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if let Some(stored) = entries.get_mut(key) {
            if !stored.is_expired(now) {
                stored.deadline = deadline_after(now, ttl);
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lamina_core::TtlPolicy;
    use tokio::time::sleep;

    fn make_adapter() -> (Arc<MemoryRemoteStore>, RemoteBackend) {
        let store = Arc::new(MemoryRemoteStore::new());
        let backend = RemoteBackend::new(Arc::clone(&store) as Arc<dyn RemoteStore>);
        (store, backend)
    }

    #[tokio::test]
    async fn test_store_honors_deadlines() {
        let store = MemoryRemoteStore::new();
        store
            .set(
                "k",
                b"v".to_vec(),
                Some(Duration::from_millis(30)),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_expire_rearms_deadline() {
        let store = MemoryRemoteStore::new();
        store
            .set(
                "k",
                b"v".to_vec(),
                Some(Duration::from_millis(50)),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();

        store.expire("k", Duration::from_millis(400)).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_expire_on_absent_key_is_a_no_op() {
        let store = MemoryRemoteStore::new();
        store.expire("nothing", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_next_counts_down() {
        let store = MemoryRemoteStore::new();
        store.fail_next(2, FailureCode::Timeout);

        assert!(store.get("k").await.is_err());
        assert!(store.get("k").await.is_err());
        assert!(store.get("k").await.is_ok());
        assert_eq!(store.get_calls(), 3);
    }

    #[tokio::test]
    async fn test_fail_always_until_cleared() {
        let store = MemoryRemoteStore::new();
        store.fail_always(FailureCode::ConnectionFailed);

        assert!(store.get("k").await.is_err());
        assert!(store.remove("k").await.is_err());

        store.clear_failures();
        assert!(store.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_fail_op_targets_one_operation() {
        let store = MemoryRemoteStore::new();
        store.fail_op(StoreOp::Set, 1, FailureCode::OutOfMemory);

        assert!(store.get("k").await.is_ok());
        let error = store
            .set("k", b"v".to_vec(), None, WriteMode::Overwrite)
            .await
            .unwrap_err();
        assert_eq!(error.code, FailureCode::OutOfMemory);

        // Script spent, later writes pass.
        assert!(store
            .set("k", b"v".to_vec(), None, WriteMode::Overwrite)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_adapter_round_trips_envelopes() {
        let (_store, backend) = make_adapter();
        let entry = CacheEntry::now(
            b"payload".to_vec(),
            &TtlPolicy::absolute(Duration::from_secs(60)),
        );

        backend.set("k", &entry, WriteMode::Overwrite).await.unwrap();
        let fetched = backend.get("k").await.unwrap().unwrap();
        assert_eq!(fetched, entry);

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_adapter_derives_store_ttl_from_envelope() {
        let (store, backend) = make_adapter();
        let entry = CacheEntry::now(
            b"v".to_vec(),
            &TtlPolicy::absolute(Duration::from_millis(40)),
        );
        backend.set("k", &entry, WriteMode::Overwrite).await.unwrap();

        sleep(Duration::from_millis(90)).await;

        // The store's own deadline fires even though the adapter never
        // re-checks envelope expiry.
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adapter_refresh_uses_the_stored_window() {
        let (store, backend) = make_adapter();
        let entry = CacheEntry::now(
            b"v".to_vec(),
            &TtlPolicy::sliding(Duration::from_millis(900)),
        );
        backend.set("k", &entry, WriteMode::Overwrite).await.unwrap();

        sleep(Duration::from_millis(600)).await;
        backend.refresh_ttl("k").await.unwrap();
        assert_eq!(store.expire_calls(), 1);

        sleep(Duration::from_millis(600)).await;

        // Past the write-time deadline, inside the window recovered from the
        // stored envelope.
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_adapter_refresh_skips_absolute_entries() {
        let (store, backend) = make_adapter();
        let entry = CacheEntry::now(
            b"v".to_vec(),
            &TtlPolicy::absolute(Duration::from_secs(60)),
        );
        backend.set("k", &entry, WriteMode::Overwrite).await.unwrap();

        backend.refresh_ttl("k").await.unwrap();

        assert_eq!(store.expire_calls(), 0);
    }

    #[tokio::test]
    async fn test_adapter_refresh_on_absent_key_is_a_no_op() {
        let (store, backend) = make_adapter();
        backend.refresh_ttl("nothing").await.unwrap();
        assert_eq!(store.expire_calls(), 0);
    }

    #[tokio::test]
    async fn test_adapter_drops_undecodable_envelope() {
        let (store, backend) = make_adapter();
        store
            .set("k", b"garbage".to_vec(), None, WriteMode::Overwrite)
            .await
            .unwrap();

        assert!(backend.get("k").await.unwrap().is_none());
        assert_eq!(store.entry_count().await, 0);
        assert_eq!(store.remove_calls(), 1);
    }

    #[tokio::test]
    async fn test_adapter_passes_store_failures_through() {
        let (store, backend) = make_adapter();
        store.fail_next(1, FailureCode::StillLoading);

        let error = backend.get("k").await.unwrap_err();
        assert_eq!(error.code, FailureCode::StillLoading);
    }

    #[tokio::test]
    async fn test_store_if_absent_keeps_existing_value() {
        let store = MemoryRemoteStore::new();
        store
            .set("k", b"first".to_vec(), None, WriteMode::Overwrite)
            .await
            .unwrap();
        store
            .set("k", b"second".to_vec(), None, WriteMode::IfAbsent)
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"first".to_vec()));
    }
}
