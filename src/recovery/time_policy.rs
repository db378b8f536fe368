//! Retry eligibility by event age.
//!
//! Replaying very old failures against a ledger whose state has since moved on does
//! more harm than good, so anything older than the configured window is dropped.

use chrono::Duration;

/// Default retry window
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyPolicy {
    max_age_millis: i64,
}

impl Default for RecencyPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_MAX_AGE_HOURS))
    }
}

impl RecencyPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age_millis: max_age.num_milliseconds(),
        }
    }

    pub fn max_age_millis(&self) -> i64 {
        self.max_age_millis
    }

    /// Eligible iff `now - occurred_at <= max_age`. Events stamped in the future are
    /// eligible. Total over all `i64` inputs.
    pub fn is_eligible(&self, occurred_at_millis: i64, now_millis: i64) -> bool {
        age_millis(occurred_at_millis, now_millis) <= i128::from(self.max_age_millis)
    }
}

/// Signed age; widened so extreme inputs cannot overflow
pub fn age_millis(occurred_at_millis: i64, now_millis: i64) -> i128 {
    i128::from(now_millis) - i128::from(occurred_at_millis)
}

/// [`RecencyPolicy::is_eligible`] with the default 24 hour window
pub fn is_eligible(occurred_at_millis: i64, now_millis: i64) -> bool {
    RecencyPolicy::default().is_eligible(occurred_at_millis, now_millis)
}
