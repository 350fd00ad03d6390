//! Fuzz test for the persisted cache envelope
//!
//! This fuzz target feeds arbitrary byte sequences to the envelope decoder
//! to find:
//! - Panics or crashes in decoding
//! - Panics in deadline arithmetic on decoded timestamps
//! - Envelopes that survive decoding but not re-encoding
//!
//! Run with: cargo +nightly fuzz run envelope_fuzz -- -max_total_time=60

#![no_main]

use chrono::Utc;
use lamina_core::CacheEntry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding must reject garbage with an error, never a panic.
    if let Ok(entry) = CacheEntry::decode(data) {
        // Deadline math on whatever timestamps made it through decoding
        // must not panic, including extreme and far-future values.
        let now = Utc::now();
        let _ = entry.is_expired(now);
        let _ = entry.time_to_live(now);
        let _ = entry.slid_deadline(now);
        let _ = entry.is_sliding();

        // Anything that decodes must survive a round trip unchanged.
        if let Ok(bytes) = entry.encode() {
            let reparsed = CacheEntry::decode(&bytes).expect("re-encoded envelope must decode");
            assert_eq!(entry, reparsed);
        }
    }
});
