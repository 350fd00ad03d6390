//! Error types for the cache layer.
//!
//! Backends and tiers speak `BackendError`; the coordinator folds everything
//! a caller can see into `CacheError`. Every type here is `Clone` because a
//! single failure may fan out to many concurrent waiters of the same load.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// FAILURE VOCABULARY
// ============================================================================

/// Failure codes reported by cache backends.
///
/// Adapters translate store-specific failures into this vocabulary so the
/// classifier can decide retryability without knowing which store raised
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// The connection to the store could not be established.
    ConnectionFailed,
    /// The store is reachable but still loading its dataset.
    StillLoading,
    /// The connection was disposed while the operation was in flight.
    ConnectionDisposed,
    /// The operation exceeded its deadline.
    Timeout,
    /// The store rejected the credentials.
    AuthenticationFailed,
    /// The store rejected the command as malformed or unsupported.
    CommandRejected,
    /// The store has no capacity left.
    OutOfMemory,
    /// A failure without a more specific code.
    Internal,
}

// ============================================================================
// COMPONENT ERRORS
// ============================================================================

/// A cache backend operation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cache backend failure ({code:?}): {message}")]
pub struct BackendError {
    /// Failure code in the classifier's vocabulary.
    pub code: FailureCode,
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl BackendError {
    /// Create a backend error with an explicit code.
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The connection to the store could not be established or was lost.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(FailureCode::ConnectionFailed, message)
    }

    /// The operation ran past its deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureCode::Timeout, message)
    }

    /// A failure without a more specific code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureCode::Internal, message)
    }
}

/// The caller-supplied source loader failed.
///
/// This layer never retries the source; the error is delivered as-is to
/// every waiter that shared the load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Source load failed: {message}")]
pub struct SourceError {
    /// Description of the source failure.
    pub message: String,
}

impl SourceError {
    /// Create a source error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-call option validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// An option value fails validation.
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Construction-time configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    /// A setting value fails validation.
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// ============================================================================
// TOP-LEVEL ERROR
// ============================================================================

/// Master error type for cache calls.
///
/// `Unavailable` and `Source` are deliberately distinct so upstream layers
/// can degrade differently: a cache outage can be survived by going to the
/// source, a source failure cannot.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache could not serve the call and failover was not allowed.
    #[error("Cache unavailable for {key}: {source}")]
    Unavailable { key: String, source: BackendError },

    /// Source loader error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Options error.
    #[error("Options error: {0}")]
    Options(#[from] OptionsError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A value could not be serialized or deserialized.
    #[error("Codec failure for {key}: {reason}")]
    Codec { key: String, reason: String },
}

/// Result type alias using CacheError.
pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// TESTS
// ============================================================================
