/*!
 * Timestamp helpers for the point services' wire format.
 *
 * The services exchange zone-less local date-times (`2024-12-02T18:29:11.329`)
 * interpreted in a fixed, configured offset. Failure messages carry epoch
 * milliseconds, so every outbound timestamp goes through these two functions.
 */

use chrono::{DateTime, FixedOffset, Utc};

/// Millisecond-precision local date-time without an offset suffix
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// `None` when the value lies outside chrono's representable range
pub fn epoch_millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

pub fn format_local_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format(LOCAL_TIMESTAMP_FORMAT)
        .to_string()
}
