//! ISO-8601 timestamp helpers.
//!
//! All timestamps the processor writes use one fixed-width UTC layout
//! (`2024-05-01T12:00:00.000000Z`) so that plain string comparison orders them
//! chronologically. Incoming timestamps in any RFC 3339 form are normalized to
//! the same layout before they are compared.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Format a point in time using the fixed-width UTC layout.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let utc = at.to_offset(UtcOffset::UTC);
    utc.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    ))
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Current time in the fixed-width UTC layout.
pub fn now_timestamp() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

/// Re-format an RFC 3339 timestamp into the fixed-width layout.
///
/// Values that do not parse are returned unchanged.
pub fn normalize_timestamp(value: &str) -> String {
    parse_timestamp(value)
        .map(format_timestamp)
        .unwrap_or_else(|| value.to_string())
}

/// Timestamp `seconds` before `now`, in the fixed-width layout.
pub fn timestamp_seconds_before(now: OffsetDateTime, seconds: u64) -> String {
    format_timestamp(now - Duration::seconds(seconds as i64))
}

/// Unix epoch seconds of `at`.
#[inline]
pub fn epoch_seconds(at: OffsetDateTime) -> i64 {
    at.unix_timestamp()
}
