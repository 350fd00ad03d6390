//! Property-Based Tests for the Remote Adapter and Retry Path
//!
//! Property: for any payload and expiration policy, a value written through
//! the remote adapter SHALL read back byte-identical; transient failures
//! below the attempt budget SHALL never reach the caller; and whether a
//! failure code is retried at all SHALL be decided by the classifier table
//! alone.
//!
//! This validates:
//! - The envelope survives the store round trip for arbitrary bytes
//! - The retry executor absorbs exactly the scripted number of failures
//! - Reconfiguring the transient table changes retry behavior without
//!   touching the executor

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use lamina_cache::{
    CacheBackend, MemoryRemoteStore, RemoteBackend, RemoteStore, RetryExecutor, StoreOp,
    TransientErrorClassifier, WriteMode,
};
use lamina_core::{CacheEntry, FailureCode, RetryConfig, TtlPolicy};

// ============================================================================
// ARBITRATORS
// ============================================================================

fn arb_window() -> impl Strategy<Value = Duration> {
    (1u64..86_400).prop_map(Duration::from_secs)
}

fn arb_ttl_policy() -> impl Strategy<Value = TtlPolicy> {
    prop_oneof![
        arb_window().prop_map(TtlPolicy::Absolute),
        arb_window().prop_map(TtlPolicy::Sliding),
    ]
}

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

fn arb_failure_code() -> impl Strategy<Value = FailureCode> {
    prop_oneof![
        Just(FailureCode::ConnectionFailed),
        Just(FailureCode::StillLoading),
        Just(FailureCode::ConnectionDisposed),
        Just(FailureCode::Timeout),
        Just(FailureCode::AuthenticationFailed),
        Just(FailureCode::CommandRejected),
        Just(FailureCode::OutOfMemory),
        Just(FailureCode::Internal),
    ]
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Drives an async body on a throwaway single-threaded runtime so it can run
/// inside a synchronous proptest case.
fn run<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("test runtime")
        .block_on(future)
}

fn adapter() -> (Arc<MemoryRemoteStore>, RemoteBackend) {
    let store = Arc::new(MemoryRemoteStore::new());
    let backend = RemoteBackend::new(Arc::clone(&store) as Arc<dyn RemoteStore>);
    (store, backend)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: bytes written through the remote adapter read back unchanged,
    /// whatever the payload or expiration policy.
    #[test]
    fn prop_adapter_round_trips_any_payload(
        payload in arb_payload(),
        ttl in arb_ttl_policy(),
    ) {
        run(async {
            let (_store, backend) = adapter();

            let entry = CacheEntry::now(payload.clone(), &ttl);
            backend
                .set("prop:key", &entry, WriteMode::Overwrite)
                .await
                .map_err(|e| TestCaseError::fail(format!("write failed: {}", e)))?;

            let found = backend
                .get("prop:key")
                .await
                .map_err(|e| TestCaseError::fail(format!("read failed: {}", e)))?;
            let found = found.ok_or_else(|| TestCaseError::fail("fresh entry was not live"))?;

            prop_assert_eq!(found.is_sliding(), ttl.is_sliding());
            prop_assert_eq!(found.payload, payload);
            Ok(())
        })?;
    }

    /// Property: the retry executor absorbs any scripted failure streak that
    /// stays below the attempt budget, and the store sees one extra call.
    #[test]
    fn prop_failures_below_budget_are_absorbed(
        payload in arb_payload(),
        failures in 0u32..3,
    ) {
        run(async {
            let (store, backend) = adapter();
            let executor = RetryExecutor::new(RetryConfig::new(4), TransientErrorClassifier::new());

            let ttl = TtlPolicy::absolute(Duration::from_secs(600));
            let entry = CacheEntry::now(payload.clone(), &ttl);
            backend
                .set("prop:key", &entry, WriteMode::Overwrite)
                .await
                .map_err(|e| TestCaseError::fail(format!("write failed: {}", e)))?;

            store.fail_op(StoreOp::Get, failures, FailureCode::ConnectionFailed);
            let found = executor
                .execute("remote_get", || backend.get("prop:key"))
                .await
                .map_err(|e| TestCaseError::fail(format!("retries exhausted: {}", e)))?;
            let found = found.ok_or_else(|| TestCaseError::fail("stored entry was not live"))?;

            prop_assert_eq!(found.payload, payload);
            prop_assert_eq!(store.get_calls(), u64::from(failures) + 1);
            Ok(())
        })?;
    }

    /// Property: a code in the transient table burns the whole attempt budget;
    /// any other code surfaces after a single call.
    #[test]
    fn prop_retry_follows_the_classifier_table(
        code in arb_failure_code(),
        transient in prop::collection::hash_set(arb_failure_code(), 0..8),
    ) {
        run(async {
            let (store, backend) = adapter();
            let classifier = TransientErrorClassifier::with_transient_codes(transient.clone());
            let executor = RetryExecutor::new(RetryConfig::new(3), classifier);

            store.fail_always(code);
            let error = match executor.execute("remote_get", || backend.get("prop:key")).await {
                Err(error) => error,
                Ok(_) => return Err(TestCaseError::fail("a scripted failure got through")),
            };

            prop_assert_eq!(error.code, code);
            let expected: u64 = if transient.contains(&code) { 3 } else { 1 };
            prop_assert_eq!(store.get_calls(), expected);
            Ok(())
        })?;
    }
}

// ============================================================================
// SPECIFIC CASE TESTS
// ============================================================================

#[tokio::test]
async fn test_empty_payload_round_trips() {
    let (_store, backend) = adapter();
    let ttl = TtlPolicy::absolute(Duration::from_secs(600));
    let entry = CacheEntry::now(Vec::new(), &ttl);

    backend.set("prop:key", &entry, WriteMode::Overwrite).await.unwrap();
    let found = backend.get("prop:key").await.unwrap().unwrap();

    assert!(found.payload.is_empty());
}

#[tokio::test]
async fn test_empty_transient_table_never_retries() {
    let (store, backend) = adapter();
    let classifier = TransientErrorClassifier::with_transient_codes(HashSet::new());
    let executor = RetryExecutor::new(RetryConfig::new(5), classifier);

    store.fail_always(FailureCode::ConnectionFailed);
    let error = executor
        .execute("remote_get", || backend.get("prop:key"))
        .await
        .unwrap_err();

    assert_eq!(error.code, FailureCode::ConnectionFailed);
    assert_eq!(store.get_calls(), 1);
}
