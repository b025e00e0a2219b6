//! Timestamp utilities
//!
//! Reviews carry local wall-clock timestamps without an offset, stored as
//! `YYYY-MM-DD HH:MM:SS`.

use chrono::{Local, NaiveDateTime, Timelike};

/// Storage format for review timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for export file names
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Get current local wall-clock time, truncated to whole seconds
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Format a timestamp for storage
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp
///
/// Accepts the storage format, ISO-8601 with a `T` separator (optionally
/// with fractional seconds), and a bare date. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Timestamp assigned to rows whose stored timestamp cannot be parsed
pub fn fallback_timestamp() -> NaiveDateTime {
    NaiveDateTime::default()
}
