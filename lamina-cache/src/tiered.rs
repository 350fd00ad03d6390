//! Tier composition: an optional local tier in front of an optional remote
//! tier.
//!
//! Reads consult the local tier first and short-circuit on a hit. A remote
//! hit is returned as-is and deliberately not copied into the local tier:
//! population is the coordinator's job after a source load, and doing it
//! here would hand local entries a lifetime nobody chose. Writes fan out
//! according to the call's options, with the remote tier carrying the
//! authoritative copy; a cache with only a local tier treats that tier as
//! authoritative and always writes it.
//!
//! Remote operations run under the retry executor. Local tier failures never
//! fail a call that still has the remote tier to lean on; they are logged
//! and skipped.

use std::sync::Arc;

use chrono::Utc;

use lamina_core::{BackendError, CacheEntry, CacheOptions, ConfigError};

use crate::backend::{CacheBackend, CacheStats, WriteMode};
use crate::retry::RetryExecutor;

/// Counter snapshots for each configured tier.
#[derive(Debug, Clone, Default)]
pub struct TieredStats {
    /// Local tier counters, when a local tier is configured.
    pub local: Option<CacheStats>,
    /// Remote tier counters, when a remote tier is configured.
    pub remote: Option<CacheStats>,
}

/// A cache assembled from up to two tiers.
///
/// Built once at startup in one of three shapes and injected wherever cache
/// access is needed; call sites never branch on which tiers exist.
#[derive(Clone)]
pub struct TieredCache {
    local: Option<Arc<dyn CacheBackend>>,
    remote: Option<Arc<dyn CacheBackend>>,
    retry: RetryExecutor,
}

impl TieredCache {
    /// Compose a cache from explicit tiers. At least one tier is required.
    pub fn new(
        local: Option<Arc<dyn CacheBackend>>,
        remote: Option<Arc<dyn CacheBackend>>,
        retry: RetryExecutor,
    ) -> Result<Self, ConfigError> {
        if local.is_none() && remote.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "local or remote tier".to_string(),
            });
        }
        Ok(Self {
            local,
            remote,
            retry,
        })
    }

    /// In-process tier only.
    pub fn local_only(local: Arc<dyn CacheBackend>, retry: RetryExecutor) -> Self {
        Self {
            local: Some(local),
            remote: None,
            retry,
        }
    }

    /// Remote tier only.
    pub fn remote_only(remote: Arc<dyn CacheBackend>, retry: RetryExecutor) -> Self {
        Self {
            local: None,
            remote: Some(remote),
            retry,
        }
    }

    /// Local tier shadowing a remote tier.
    pub fn layered(
        local: Arc<dyn CacheBackend>,
        remote: Arc<dyn CacheBackend>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            local: Some(local),
            remote: Some(remote),
            retry,
        }
    }

    /// Check if a local tier is configured.
    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Check if a remote tier is configured.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Read `key`, local tier first.
    ///
    /// A local failure falls through to the remote tier when one exists;
    /// otherwise it is the call's failure.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        if let Some(local) = &self.local {
            match local.get(key).await {
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {}
                Err(error) => {
                    if self.remote.is_none() {
                        return Err(error);
                    }
                    tracing::warn!(key = %key, error = %error, "Local tier read failed, trying remote");
                }
            }
        }

        match &self.remote {
            Some(remote) => self.retry.execute("remote_get", || remote.get(key)).await,
            None => Ok(None),
        }
    }

    /// Write `payload` under `key` according to `options`.
    ///
    /// The local copy is written when `options.write_local` asks for one,
    /// and always when the local tier is the only tier. A local failure is
    /// only logged while a remote tier exists; the remote write's outcome is
    /// the call's outcome.
    pub async fn set(
        &self,
        key: &str,
        payload: &[u8],
        options: &CacheOptions,
    ) -> Result<(), BackendError> {
        let now = Utc::now();

        if let Some(local) = &self.local {
            if options.write_local || self.remote.is_none() {
                let entry = CacheEntry::new(payload.to_vec(), &options.local_ttl(), now);
                if let Err(error) = local.set(key, &entry, WriteMode::Overwrite).await {
                    if self.remote.is_none() {
                        return Err(error);
                    }
                    tracing::warn!(key = %key, error = %error, "Local tier write failed");
                }
            }
        }

        if let Some(remote) = &self.remote {
            let entry = CacheEntry::new(payload.to_vec(), &options.ttl, now);
            self.retry
                .execute("remote_set", || remote.set(key, &entry, WriteMode::Overwrite))
                .await?;
        }

        Ok(())
    }

    /// Remove `key` from both tiers.
    ///
    /// Local removal is best-effort and logged on failure while a remote
    /// tier exists to carry the removal; a lone local tier's failure is the
    /// call's failure.
    pub async fn remove(&self, key: &str) -> Result<(), BackendError> {
        if let Some(local) = &self.local {
            if let Err(error) = local.remove(key).await {
                if self.remote.is_none() {
                    return Err(error);
                }
                tracing::warn!(key = %key, error = %error, "Local tier removal failed");
            }
        }

        if let Some(remote) = &self.remote {
            self.retry
                .execute("remote_remove", || remote.remove(key))
                .await?;
        }

        Ok(())
    }

    /// Re-arm sliding deadlines for `key` on both tiers.
    ///
    /// Each tier recovers the window from its own stored entry, so per-tier
    /// windows stay independent.
    pub async fn refresh_ttl(&self, key: &str) -> Result<(), BackendError> {
        if let Some(local) = &self.local {
            if let Err(error) = local.refresh_ttl(key).await {
                tracing::warn!(key = %key, error = %error, "Local tier deadline refresh failed");
            }
        }

        if let Some(remote) = &self.remote {
            self.retry
                .execute("remote_refresh_ttl", || remote.refresh_ttl(key))
                .await?;
        }

        Ok(())
    }

    /// Counter snapshots from every configured tier.
    pub async fn stats(&self) -> Result<TieredStats, BackendError> {
        let local = match &self.local {
            Some(backend) => Some(backend.stats().await?),
            None => None,
        };
        let remote = match &self.remote {
            Some(backend) => Some(backend.stats().await?),
            None => None,
        };
        Ok(TieredStats { local, remote })
    }
}

// ============================================================================
// TESTS
// ============================================================================
