//! Single-flight deduplication of source loads.
//!
//! One load per key per miss episode: the first caller to miss becomes the
//! leader and spawns the load as a detached task; everyone else arriving
//! before it settles subscribes to the same outcome. The flight record is
//! removed before the outcome is published, so a caller arriving after
//! settlement always starts a fresh load. Because the load runs detached, a
//! waiter abandoning its request never cancels the load for the rest.
//!
//! Outcomes travel as serialized bytes so one map serves every value type.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use lamina_core::{CacheKey, SourceError};

/// Failure of a shared load, cloned out to every waiter.
#[derive(Debug, Clone)]
pub(crate) enum FlightError {
    /// The source loader failed.
    Source(SourceError),
    /// The loaded value could not be serialized for fan-out.
    Codec(String),
}

#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    Settled(Result<Vec<u8>, FlightError>),
}

type FlightTable = Arc<Mutex<HashMap<CacheKey, watch::Receiver<FlightState>>>>;

/// Removes the flight record when the leader task finishes or unwinds.
struct FlightGuard {
    flights: FlightTable,
    key: CacheKey,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut flights) = self.flights.lock() {
            flights.remove(&self.key);
        }
    }
}

/// Keyed map of in-flight loads.
///
/// The lock guards only map mutation and is never held across an await.
#[derive(Clone)]
pub(crate) struct FlightMap {
    flights: FlightTable,
}

impl FlightMap {
    pub(crate) fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight load for `key`, or lead a new one running `load`
    /// detached. Every caller of the same episode receives the same outcome.
    pub(crate) async fn load_shared<F>(&self, key: &str, load: F) -> Result<Vec<u8>, FlightError>
    where
        F: Future<Output = Result<Vec<u8>, FlightError>> + Send + 'static,
    {
        let rx = {
            let mut flights = self.flights.lock().unwrap();
            if let Some(rx) = flights.get(key) {
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(FlightState::Pending);
                flights.insert(key.to_string(), rx.clone());
                let guard = FlightGuard {
                    flights: Arc::clone(&self.flights),
                    key: key.to_string(),
                };
                tokio::spawn(async move {
                    let outcome = load.await;
                    // Clear the record before publishing so late arrivals
                    // start a fresh load instead of observing this one.
                    drop(guard);
                    let _ = tx.send(FlightState::Settled(outcome));
                });
                rx
            }
        };

        Self::wait(rx).await
    }

    async fn wait(mut rx: watch::Receiver<FlightState>) -> Result<Vec<u8>, FlightError> {
        loop {
            let state = rx.borrow().clone();
            if let FlightState::Settled(outcome) = state {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // The leader task died without publishing.
                return Err(FlightError::Source(SourceError::new(
                    "load task stopped before publishing a result",
                )));
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.flights.lock().unwrap().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
