//! Timestamp utilities
//!
//! Classifier creation times arrive from the classifier service as ISO-8601-like
//! strings (e.g. `2016-05-27T05:43:25.828Z`) without a guaranteed offset. All
//! lifecycle comparisons happen on whole seconds since the Unix epoch, with
//! offset-less strings interpreted as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::SystemTime;

/// Seconds since 1970-01-01T00:00:00Z
pub type EpochSeconds = i64;

/// Offset-less layouts accepted from the service, tried in order
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time in epoch seconds
pub fn now_epoch() -> EpochSeconds {
    Utc::now().timestamp()
}

/// Parse a classifier service timestamp into epoch seconds
///
/// Accepts RFC 3339 (`Z` or numeric offset), `+hhmm` offsets, and offset-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC). Sub-second precision is dropped.
///
/// Returns `None` for anything else, including out-of-range fields such as
/// month 13; callers treat `None` as older than every parsable timestamp.
pub fn parse_service_timestamp(raw: &str) -> Option<EpochSeconds> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc).timestamp());
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

/// Convert a filesystem timestamp into epoch seconds
///
/// Times before the epoch (bogus mtimes on some filesystems) clamp to 0.
pub fn system_time_to_epoch(time: SystemTime) -> EpochSeconds {
    let dt: DateTime<Utc> = time.into();
    dt.timestamp().max(0)
}
