//! Maps a [`FailureRecord`] onto the ledger's `POST /point/use` body.

use chrono::FixedOffset;
use serde::Serialize;

use super::codec::FailureRecord;
use crate::utils::time::format_local_timestamp;

/// Leading marker of every retry description in the ledger audit trail
pub const RETRY_DESCRIPTION_PREFIX: &str = "[RECOVERY ACTION] point use failed RETRY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRequest {
    pub company_no: i32,
    pub user_no: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<i32>,
    pub point_action_type: String,
    pub point_group_key: String,
    pub description: String,
    /// Original event time, not the time of the retry
    pub current_time_stamp: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryRequestBuilder {
    offset: FixedOffset,
}

impl RetryRequestBuilder {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn build(&self, record: &FailureRecord) -> RetryRequest {
        let event_time = format_local_timestamp(record.occurred_at(), self.offset);

        RetryRequest {
            company_no: record.company_no(),
            user_no: record.user_no(),
            point: record.point(),
            point_action_type: record.action_type().to_string(),
            point_group_key: record.group_key().to_string(),
            description: format!(
                "{RETRY_DESCRIPTION_PREFIX} pointGroupKey={} updateTimestamp={event_time}",
                record.group_key()
            ),
            current_time_stamp: event_time,
        }
    }
}
