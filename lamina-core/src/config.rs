//! Construction-time configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default attempt budget for remote cache operations.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default sweep interval for the local tier purge task, in seconds.
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;

// ============================================================================
// RETRY
// ============================================================================

/// Retry budget for remote tier operations.
///
/// Attempts are bounded by count, not wall clock, and are not paced: the
/// remote session's own operation timeouts provide the spacing between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    /// Create a retry budget of `max_attempts` total attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Load from environment variables with fallback to defaults.
    ///
    /// Reads `LAMINA_RETRY_MAX_ATTEMPTS`.
    pub fn from_env() -> Self {
        Self {
            max_attempts: std::env::var("LAMINA_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Validate the budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// PURGE
// ============================================================================

/// Settings for the local tier's periodic sweep of expired entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// How often the sweep runs.
    pub sweep_interval: Duration,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        }
    }
}

impl PurgeConfig {
    /// Create a purge schedule sweeping every `sweep_interval`.
    pub fn new(sweep_interval: Duration) -> Self {
        Self { sweep_interval }
    }

    /// Load from environment variables with fallback to defaults.
    ///
    /// Reads `LAMINA_PURGE_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        Self {
            sweep_interval: Duration::from_secs(
                std::env::var("LAMINA_PURGE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PURGE_INTERVAL_SECS),
            ),
        }
    }

    /// Validate the schedule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval".to_string(),
                value: "0".to_string(),
                reason: "sweep interval must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
