//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Order two player IDs lexicographically
pub fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Generate a match ID from an already sorted pair and the commit instant
///
/// The random suffix keeps IDs unique when the same pair is retried within
/// the same millisecond.
pub fn generate_match_id(lo: &str, hi: &str, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "match_{}_{}_{}_{}",
        lo,
        hi,
        now.timestamp_millis(),
        &suffix[..8]
    )
}

/// Milliseconds from `since` to `now`, clamped at zero
pub fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - since).num_milliseconds().max(0) as u64
}
