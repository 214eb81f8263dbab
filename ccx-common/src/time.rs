//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC timestamp truncated to whole milliseconds.
///
/// Refresh batches are stamped with this value so the timestamp survives a
/// round trip through the store unchanged.
pub fn batch_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}
