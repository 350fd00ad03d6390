//! Cache-aside orchestration.
//!
//! The coordinator owns the full read path: look up the tiered cache, fall
//! back to the caller's source loader on a miss, write the loaded value
//! back, and return it. Concurrent callers for the same key share one source
//! load. Values cross the cache as serialized bytes, so the coordinator is
//! the only place that knows the caller's value type.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use lamina_core::{BackendError, CacheError, CacheOptions, CacheResult, SourceError};

use crate::flight::{FlightError, FlightMap};
use crate::tiered::{TieredCache, TieredStats};

/// Cache-aside coordinator over a [`TieredCache`].
///
/// Clones share the underlying cache and the in-flight load table, so a
/// coordinator can be handed to every task that needs it.
///
/// # Example
///
/// ```ignore
/// let coordinator = CacheCoordinator::new(cache);
/// let options = CacheOptions::new().with_absolute_ttl(Duration::from_secs(600));
///
/// let category: Option<Category> = coordinator
///     .get_or_load("category:42", &options, |_key| async move {
///         database.fetch_category(42).await.map_err(|e| SourceError::new(e.to_string()))
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<TieredCache>,
    flights: FlightMap,
}

impl CacheCoordinator {
    /// Create a coordinator over `cache`.
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self {
            cache,
            flights: FlightMap::new(),
        }
    }

    /// The underlying tiered cache.
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Fetch the value for `key`, loading it from the source on a miss.
    ///
    /// On a hit the cached value is returned at once; a sliding entry also
    /// gets its deadline re-armed in the background. On a miss the loader
    /// runs at most once per key across concurrent callers, its result is
    /// written back per `options`, and every waiting caller receives the
    /// same outcome. The loader runs detached: a caller abandoning its
    /// request does not cancel the load for the others.
    ///
    /// When the cache cannot be read, `options.failover_on_error` decides
    /// between loading straight from the source (skipping the write-back,
    /// since the cache is known to be unhealthy) and failing with
    /// [`CacheError::Unavailable`]. A failed write-back never discards a
    /// successfully loaded value; it is logged and the value returned.
    ///
    /// `None` is a cacheable outcome: absence gets stored as a marker entry
    /// unless `options.remove_if_none` asks for the key to be dropped
    /// instead.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        options: &CacheOptions,
        loader: F,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, SourceError>> + Send + 'static,
    {
        options.validate()?;

        let populate = match self.cache.get(key).await {
            Ok(Some(entry)) => {
                if entry.is_sliding() {
                    self.spawn_refresh(key);
                }
                match serde_json::from_slice::<Option<T>>(&entry.payload) {
                    Ok(value) => return Ok(value),
                    Err(error) => {
                        // A payload that no longer decodes is dropped and
                        // reloaded rather than surfaced.
                        tracing::warn!(
                            key = %key,
                            error = %error,
                            "Discarding cache entry with undecodable payload"
                        );
                        if let Err(remove_error) = self.cache.remove(key).await {
                            tracing::debug!(
                                key = %key,
                                error = %remove_error,
                                "Could not remove undecodable cache entry"
                            );
                        }
                        true
                    }
                }
            }
            Ok(None) => true,
            Err(error) => {
                if !options.failover_on_error {
                    return Err(CacheError::Unavailable {
                        key: key.to_string(),
                        source: error,
                    });
                }
                tracing::warn!(
                    key = %key,
                    error = %error,
                    "Cache lookup failed, loading directly from source"
                );
                false
            }
        };

        let load = {
            let cache = Arc::clone(&self.cache);
            let options = options.clone();
            let key = key.to_string();
            async move {
                let loaded = loader(key.clone()).await.map_err(FlightError::Source)?;
                let payload = serde_json::to_vec(&loaded)
                    .map_err(|error| FlightError::Codec(error.to_string()))?;

                if populate {
                    if loaded.is_none() && options.remove_if_none {
                        if let Err(error) = cache.remove(&key).await {
                            tracing::warn!(
                                key = %key,
                                error = %error,
                                "Could not drop key after absent source value"
                            );
                        }
                    } else if let Err(error) = cache.set(&key, &payload, &options).await {
                        tracing::warn!(
                            key = %key,
                            error = %error,
                            "Loaded value could not be written back to the cache"
                        );
                    }
                }

                Ok(payload)
            }
        };

        let payload = match self.flights.load_shared(key, load).await {
            Ok(payload) => payload,
            Err(FlightError::Source(error)) => return Err(CacheError::Source(error)),
            Err(FlightError::Codec(reason)) => {
                return Err(CacheError::Codec {
                    key: key.to_string(),
                    reason,
                })
            }
        };

        serde_json::from_slice::<Option<T>>(&payload).map_err(|error| CacheError::Codec {
            key: key.to_string(),
            reason: error.to_string(),
        })
    }

    /// Remove `key` from every tier.
    ///
    /// Local removal is best-effort; a remote removal failure surfaces as
    /// [`CacheError::Unavailable`] so callers know the shared copy may
    /// still exist.
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        self.cache
            .remove(key)
            .await
            .map_err(|source| CacheError::Unavailable {
                key: key.to_string(),
                source,
            })
    }

    /// Counter snapshots from every configured tier.
    pub async fn stats(&self) -> Result<TieredStats, BackendError> {
        self.cache.stats().await
    }

    fn spawn_refresh(&self, key: &str) {
        let cache = Arc::clone(&self.cache);
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(error) = cache.refresh_ttl(&key).await {
                tracing::debug!(key = %key, error = %error, "Sliding deadline refresh failed");
            }
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CacheBackend, WriteMode};
    use crate::remote::{MemoryRemoteStore, RemoteBackend, RemoteStore};
    use crate::retry::RetryExecutor;
    use lamina_core::{CacheEntry, TtlPolicy};
    use std::time::Duration;

    fn make_coordinator() -> (Arc<MemoryRemoteStore>, Arc<RemoteBackend>, CacheCoordinator) {
        let store = Arc::new(MemoryRemoteStore::new());
        let backend = Arc::new(RemoteBackend::new(
            Arc::clone(&store) as Arc<dyn RemoteStore>
        ));
        let cache = TieredCache::remote_only(
            Arc::clone(&backend) as Arc<dyn CacheBackend>,
            RetryExecutor::default(),
        );
        let coordinator = CacheCoordinator::new(Arc::new(cache));
        (store, backend, coordinator)
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_any_io() {
        let (store, _backend, coordinator) = make_coordinator();
        let options = CacheOptions::new().with_absolute_ttl(Duration::ZERO);

        let result: CacheResult<Option<u32>> = coordinator
            .get_or_load("k", &options, |_key| async move { Ok(Some(1)) })
            .await;

        assert!(matches!(result, Err(CacheError::Options(_))));
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped_and_reloaded() {
        let (store, backend, coordinator) = make_coordinator();

        // A structurally valid envelope whose payload is not a value.
        let corrupt = CacheEntry::now(
            b"not json at all".to_vec(),
            &TtlPolicy::absolute(Duration::from_secs(600)),
        );
        backend.set("k", &corrupt, WriteMode::Overwrite).await.unwrap();

        let options = CacheOptions::new().with_absolute_ttl(Duration::from_secs(600));
        let value: Option<u32> = coordinator
            .get_or_load("k", &options, |_key| async move { Ok(Some(7)) })
            .await
            .unwrap();

        assert_eq!(value, Some(7));
        assert!(store.remove_calls() >= 1);
    }

    #[tokio::test]
    async fn test_cache_accessor_exposes_tiers() {
        let (_store, _backend, coordinator) = make_coordinator();
        assert!(coordinator.cache().has_remote());
        assert!(!coordinator.cache().has_local());

        let stats = coordinator.stats().await.unwrap();
        assert!(stats.remote.is_some());
        assert!(stats.local.is_none());
    }
}
