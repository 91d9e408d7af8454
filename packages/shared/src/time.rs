//! Timestamp helpers.
//!
//! Timestamps are carried as Unix milliseconds (UTC) internally and as
//! RFC 3339 strings on the wire.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current Unix timestamp in milliseconds (UTC).
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a Unix millisecond timestamp as RFC 3339 (`2024-01-01T00:00:00.000Z`).
pub fn timestamp_to_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 string into Unix milliseconds.
///
/// Returns `None` when the string is not a valid RFC 3339 timestamp.
pub fn parse_rfc3339(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
