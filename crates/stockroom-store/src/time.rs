//! Timestamp formatting for the store.
//!
//! Rows store fixed-width UTC RFC 3339 with millisecond precision
//! (`2026-08-01T12:34:56.789Z`), so lexicographic comparison in SQL is
//! chronological comparison.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current instant in store format.
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Format an instant in store format.
pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a store timestamp.
pub fn from_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current epoch milliseconds (session expiry, rate-limit lockouts).
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
