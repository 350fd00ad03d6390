//! Bounded-attempt retry for cache-side operations.

use std::future::Future;

use lamina_core::{BackendError, RetryConfig};

use crate::classify::TransientErrorClassifier;

/// Retry wrapper for remote cache operations.
///
/// Re-runs an operation while its failures classify as transient, up to the
/// configured attempt budget. Permanent failures propagate immediately.
/// There is no backoff between attempts: the remote session's own operation
/// timeouts pace them. This only ever wraps cache-side work, never the
/// caller's source loader.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: TransientErrorClassifier,
}

impl RetryExecutor {
    /// Create an executor from a budget and a classifier.
    pub fn new(config: RetryConfig, classifier: TransientErrorClassifier) -> Self {
        Self { config, classifier }
    }

    /// The configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// The classifier deciding which failures are retryable.
    pub fn classifier(&self) -> &TransientErrorClassifier {
        &self.classifier
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, or the budget
    /// is spent. `op` names the operation in retry logs.
    pub async fn execute<T, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1u32;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.config.max_attempts || !self.classifier.is_transient(&error)
                    {
                        return Err(error);
                    }
                    tracing::debug!(
                        op,
                        attempt,
                        code = ?error.code,
                        "Transient cache failure, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default(), TransientErrorClassifier::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
