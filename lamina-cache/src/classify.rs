//! Transient failure classification.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use lamina_core::{BackendError, FailureCode};

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClassification {
    /// Expected to clear on its own; worth another attempt.
    Transient,
    /// Will not clear without intervention; retrying wastes attempts.
    Permanent,
}

/// Codes treated as transient when no custom table is supplied.
static DEFAULT_TRANSIENT_CODES: Lazy<HashSet<FailureCode>> = Lazy::new(|| {
    HashSet::from([
        FailureCode::ConnectionFailed,
        FailureCode::StillLoading,
        FailureCode::ConnectionDisposed,
        FailureCode::Timeout,
    ])
});

/// Table-driven decision on whether a backend failure is worth retrying.
///
/// The default table marks connection establishment failures, stores still
/// loading their dataset, disposed connections, and timeouts as transient;
/// everything else (authentication, rejected commands, exhausted capacity)
/// is permanent. Stores with a different failure taxonomy reconfigure the
/// table rather than wrapping the classifier.
///
/// # Example
///
/// ```ignore
/// use lamina_cache::TransientErrorClassifier;
/// use lamina_core::FailureCode;
///
/// // This deployment's proxy surfaces auth hiccups that clear on retry.
/// let classifier = TransientErrorClassifier::default()
///     .mark_transient(FailureCode::AuthenticationFailed);
/// ```
#[derive(Debug, Clone)]
pub struct TransientErrorClassifier {
    transient: HashSet<FailureCode>,
}

impl Default for TransientErrorClassifier {
    fn default() -> Self {
        Self {
            transient: DEFAULT_TRANSIENT_CODES.clone(),
        }
    }
}

impl TransientErrorClassifier {
    /// Create a classifier with the default table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with exactly the given transient codes.
    pub fn with_transient_codes(codes: impl IntoIterator<Item = FailureCode>) -> Self {
        Self {
            transient: codes.into_iter().collect(),
        }
    }

    /// Add `code` to the transient table.
    pub fn mark_transient(mut self, code: FailureCode) -> Self {
        self.transient.insert(code);
        self
    }

    /// Remove `code` from the transient table.
    pub fn mark_permanent(mut self, code: FailureCode) -> Self {
        self.transient.remove(&code);
        self
    }

    /// Classify a backend failure.
    pub fn classify(&self, error: &BackendError) -> FailureClassification {
        if self.transient.contains(&error.code) {
            FailureClassification::Transient
        } else {
            FailureClassification::Permanent
        }
    }

    /// Check if the failure is worth another attempt.
    pub fn is_transient(&self, error: &BackendError) -> bool {
        self.classify(error) == FailureClassification::Transient
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_CODES: [FailureCode; 8] = [
        FailureCode::ConnectionFailed,
        FailureCode::StillLoading,
        FailureCode::ConnectionDisposed,
        FailureCode::Timeout,
        FailureCode::AuthenticationFailed,
        FailureCode::CommandRejected,
        FailureCode::OutOfMemory,
        FailureCode::Internal,
    ];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Classification mirrors table membership exactly, for any table.
        #[test]
        fn prop_classification_matches_table(
            table in prop::collection::vec(0usize..8, 0..8),
            probe in 0usize..8,
        ) {
            let codes: Vec<FailureCode> = table.iter().map(|&i| ALL_CODES[i]).collect();
            let classifier = TransientErrorClassifier::with_transient_codes(codes.clone());

            let code = ALL_CODES[probe];
            let error = BackendError::new(code, "probe");
            prop_assert_eq!(classifier.is_transient(&error), codes.contains(&code));
        }
    }
}
