//! Per-call cache options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entry::TtlPolicy;
use crate::error::OptionsError;

/// Default expiration applied when the caller does not choose one.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Options governing a single cache call.
///
/// Immutable per call and never persisted. The remote tier always receives
/// `ttl`; a local copy is written only when `write_local` is set, using
/// `local` when present and falling back to `ttl` otherwise. A cache with
/// no remote tier writes its local tier regardless of `write_local`.
///
/// # Example
///
/// ```ignore
/// use lamina_core::{CacheOptions, TtlPolicy};
/// use std::time::Duration;
///
/// // Ten minutes remotely, a one minute shadow copy in-process.
/// let options = CacheOptions::new()
///     .with_absolute_ttl(Duration::from_secs(600))
///     .with_local_copy(CacheOptions::new().with_absolute_ttl(Duration::from_secs(60)));
/// options.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Expiration policy for the remote tier write.
    pub ttl: TtlPolicy,
    /// Write a copy to the local tier alongside the remote entry.
    pub write_local: bool,
    /// Options for the local copy. Falls back to `ttl` when absent.
    pub local: Option<Box<CacheOptions>>,
    /// Fall back to the source loader when the cache cannot be read.
    pub failover_on_error: bool,
    /// Drop the key instead of caching a marker when the loaded value is
    /// absent.
    pub remove_if_none: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::Absolute(Duration::from_secs(DEFAULT_TTL_SECS)),
            write_local: false,
            local: None,
            failover_on_error: true,
            remove_if_none: false,
        }
    }
}

impl CacheOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expiration policy for the remote tier.
    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set a fixed lifetime for the remote tier.
    pub fn with_absolute_ttl(self, ttl: Duration) -> Self {
        self.with_ttl(TtlPolicy::absolute(ttl))
    }

    /// Set an access-extended lifetime for the remote tier.
    pub fn with_sliding_ttl(self, window: Duration) -> Self {
        self.with_ttl(TtlPolicy::sliding(window))
    }

    /// Toggle writing a local copy with the same policy as the remote entry.
    pub fn with_write_local(mut self, enabled: bool) -> Self {
        self.write_local = enabled;
        self
    }

    /// Write a local copy governed by its own options. Implies `write_local`.
    pub fn with_local_copy(mut self, options: CacheOptions) -> Self {
        self.write_local = true;
        self.local = Some(Box::new(options));
        self
    }

    /// Toggle falling back to the source loader on cache read failure.
    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.failover_on_error = enabled;
        self
    }

    /// Toggle dropping the key when the loaded value is absent.
    pub fn with_remove_if_none(mut self, enabled: bool) -> Self {
        self.remove_if_none = enabled;
        self
    }

    /// The policy the local copy is written under.
    pub fn local_ttl(&self) -> TtlPolicy {
        self.local.as_deref().map_or(self.ttl, |local| local.ttl)
    }

    /// Validate option coherence.
    ///
    /// Expiration windows must be positive, local options cannot nest
    /// further, and a local copy must not outlive the remote entry it
    /// shadows.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.ttl.window().is_zero() {
            return Err(OptionsError::InvalidValue {
                field: "ttl".to_string(),
                value: format!("{:?}", self.ttl),
                reason: "expiration window must be positive".to_string(),
            });
        }

        if let Some(local) = &self.local {
            if local.local.is_some() {
                return Err(OptionsError::InvalidValue {
                    field: "local.local".to_string(),
                    value: "nested options".to_string(),
                    reason: "local tier options cannot nest further".to_string(),
                });
            }
            if local.ttl.window().is_zero() {
                return Err(OptionsError::InvalidValue {
                    field: "local.ttl".to_string(),
                    value: format!("{:?}", local.ttl),
                    reason: "expiration window must be positive".to_string(),
                });
            }
            if local.ttl.window() > self.ttl.window() {
                return Err(OptionsError::InvalidValue {
                    field: "local.ttl".to_string(),
                    value: format!("{:?}", local.ttl),
                    reason: "local copy cannot outlive the remote entry".to_string(),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A local copy validates exactly when its window fits inside the
        /// remote window.
        #[test]
        fn prop_local_window_bound(
            remote_secs in 1u64..10_000,
            local_secs in 1u64..10_000,
        ) {
            let options = CacheOptions::new()
                .with_absolute_ttl(Duration::from_secs(remote_secs))
                .with_local_copy(
                    CacheOptions::new().with_absolute_ttl(Duration::from_secs(local_secs)),
                );

            prop_assert_eq!(options.validate().is_ok(), local_secs <= remote_secs);
        }

        /// Positive windows without a local copy always validate.
        #[test]
        fn prop_positive_window_validates(secs in 1u64..1_000_000, sliding in any::<bool>()) {
            let options = if sliding {
                CacheOptions::new().with_sliding_ttl(Duration::from_secs(secs))
            } else {
                CacheOptions::new().with_absolute_ttl(Duration::from_secs(secs))
            };

            prop_assert!(options.validate().is_ok());
        }
    }
}
