//! Cache entry envelope and expiration policies.
//!
//! Both cache tiers store the same envelope: the caller's serialized value
//! plus the expiration metadata needed to re-derive deadlines later. The
//! sliding window travels inside the envelope because a deadline alone cannot
//! be "slid": re-arming on access requires knowing the original increment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Timestamp;

// ============================================================================
// EXPIRATION POLICY
// ============================================================================

/// Expiration policy for a single cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlPolicy {
    /// Expire at write time plus the duration, regardless of later access.
    Absolute(Duration),
    /// Expire when unaccessed for the window; every read re-arms the deadline.
    Sliding(Duration),
}

impl TtlPolicy {
    /// Fixed lifetime from the moment of the write.
    pub fn absolute(ttl: Duration) -> Self {
        Self::Absolute(ttl)
    }

    /// Lifetime that resets to `now + window` on every access.
    pub fn sliding(window: Duration) -> Self {
        Self::Sliding(window)
    }

    /// Check if this policy re-arms its deadline on access.
    pub fn is_sliding(&self) -> bool {
        matches!(self, Self::Sliding(_))
    }

    /// The configured duration, whichever semantics apply.
    pub fn window(&self) -> Duration {
        match self {
            Self::Absolute(ttl) => *ttl,
            Self::Sliding(window) => *window,
        }
    }
}

/// Compute the deadline reached `window` after `now`.
///
/// Returns `None` when the window is too large to represent as a concrete
/// timestamp, which callers treat as "never expires".
pub fn deadline_after(now: Timestamp, window: Duration) -> Option<Timestamp> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}

// ============================================================================
// ENTRY ENVELOPE
// ============================================================================

/// Persisted cache envelope.
///
/// The payload holds the serialized form of the caller's optional value, so
/// an explicitly absent value can be cached as a marker and read back as
/// absence. `expires_at` is the deadline as of the last write; for sliding
/// entries the store-side deadline moves forward on access while
/// `sliding_window` keeps the original increment available for each re-arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized caller value.
    pub payload: Vec<u8>,
    /// When this envelope was written.
    pub stored_at: Timestamp,
    /// Expiration deadline as of the last write, `None` for no expiry.
    pub expires_at: Option<Timestamp>,
    /// Original sliding window, present only for sliding entries.
    pub sliding_window: Option<Duration>,
}

impl CacheEntry {
    /// Build an envelope for `payload` written at `now` under `ttl`.
    pub fn new(payload: Vec<u8>, ttl: &TtlPolicy, now: Timestamp) -> Self {
        match ttl {
            TtlPolicy::Absolute(duration) => Self {
                payload,
                stored_at: now,
                expires_at: deadline_after(now, *duration),
                sliding_window: None,
            },
            TtlPolicy::Sliding(window) => Self {
                payload,
                stored_at: now,
                expires_at: deadline_after(now, *window),
                sliding_window: Some(*window),
            },
        }
    }

    /// Build an envelope written at the current instant.
    pub fn now(payload: Vec<u8>, ttl: &TtlPolicy) -> Self {
        Self::new(payload, ttl, Utc::now())
    }

    /// Check if the deadline has passed. An entry exactly at its deadline
    /// counts as expired.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Remaining lifetime at `now`, if a deadline exists. Saturates to zero
    /// once the deadline has passed.
    pub fn time_to_live(&self, now: Timestamp) -> Option<Duration> {
        self.expires_at.map(|deadline| {
            deadline
                .signed_duration_since(now)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Check if this entry re-arms its deadline on access.
    pub fn is_sliding(&self) -> bool {
        self.sliding_window.is_some()
    }

    /// The deadline an access at `now` would re-arm to, for sliding entries.
    pub fn slid_deadline(&self, now: Timestamp) -> Option<Timestamp> {
        self.sliding_window
            .and_then(|window| deadline_after(now, window))
    }

    /// Encode to the persisted byte form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from the persisted byte form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ============================================================================
// TESTS
// ============================================================================
