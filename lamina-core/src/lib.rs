//! Lamina Core - Shared Cache Types
//!
//! Pure data types with no I/O: the persisted entry envelope, the per-call
//! cache options, the failure vocabulary shared by backends and the retry
//! layer, and construction-time configuration. All cache behavior lives in
//! `lamina-cache`; this crate is the vocabulary those pieces speak.

pub mod config;
pub mod entry;
pub mod error;
pub mod options;

pub use config::{PurgeConfig, RetryConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_PURGE_INTERVAL_SECS};
pub use entry::{deadline_after, CacheEntry, TtlPolicy};
pub use error::{
    BackendError, CacheError, CacheResult, ConfigError, FailureCode, OptionsError, SourceError,
};
pub use options::{CacheOptions, DEFAULT_TTL_SECS};

use chrono::{DateTime, Utc};

// ============================================================================
// SHARED TYPE ALIASES
// ============================================================================

/// Cache keys are plain strings, namespaced by caller convention
/// (e.g. `"category:42"`).
pub type CacheKey = String;

/// Timestamp type using UTC timezone
pub type Timestamp = DateTime<Utc>;
