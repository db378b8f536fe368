//! Idempotency gate.
//!
//! Asks the history service whether the failed deduction actually landed before the
//! primary path gave up. This is the check that prevents double deduction, so every
//! unclear answer leans towards "do not retry":
//!
//! | History result                       | Answer / error            |
//! |--------------------------------------|---------------------------|
//! | `data: true`                         | [`HistoryAnswer::Exists`]   |
//! | `data: null` or missing              | [`HistoryAnswer::Unknown`]  |
//! | `data: false`                        | [`HistoryAnswer::NotFound`] |
//! | transport, non-2xx, bad body, timeout | [`GateError`]             |

use async_trait::async_trait;
use chrono::FixedOffset;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::codec::FailureRecord;
use crate::client::{ApiResponse, ClientError, ClientResult, PointApiClient};
use crate::utils::time::format_local_timestamp;

/// Body of `POST /point/history/exists`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub company_no: i32,
    pub user_no: i32,
    pub point_action_type: String,
    pub point_group_key: String,
    pub insert_timestamp: String,
}

impl HistoryQuery {
    pub fn from_record(record: &FailureRecord, action_type: &str, offset: FixedOffset) -> Self {
        Self {
            company_no: record.company_no(),
            user_no: record.user_no(),
            point_action_type: action_type.to_string(),
            point_group_key: record.group_key().to_string(),
            insert_timestamp: format_local_timestamp(record.occurred_at(), offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAnswer {
    Exists,
    NotFound,
    /// The service answered without a verdict; treated like `Exists`
    Unknown,
}

impl HistoryAnswer {
    pub fn from_data(data: Option<bool>) -> Self {
        match data {
            Some(true) => Self::Exists,
            Some(false) => Self::NotFound,
            None => Self::Unknown,
        }
    }

    /// Only a definite "not recorded" allows a retry
    pub fn allows_retry(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for HistoryAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryAnswer::Exists => write!(f, "exists"),
            HistoryAnswer::NotFound => write!(f, "not_found"),
            HistoryAnswer::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("History check failed: {0}")]
    Unavailable(#[from] ClientError),
}

/// Remote history lookup
#[async_trait]
pub trait HistoryService: Send + Sync {
    async fn history_exists(&self, query: &HistoryQuery) -> ClientResult<ApiResponse<bool>>;
}

#[async_trait]
impl HistoryService for PointApiClient {
    async fn history_exists(&self, query: &HistoryQuery) -> ClientResult<ApiResponse<bool>> {
        self.post_json(self.history_path(), query).await
    }
}

pub struct IdempotencyGate {
    service: Arc<dyn HistoryService>,
    action_type: String,
    offset: FixedOffset,
}

impl fmt::Debug for IdempotencyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyGate")
            .field("action_type", &self.action_type)
            .field("offset", &self.offset)
            .finish()
    }
}

impl IdempotencyGate {
    pub fn new(
        service: Arc<dyn HistoryService>,
        action_type: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            service,
            action_type: action_type.into(),
            offset,
        }
    }

    pub fn query_for(&self, record: &FailureRecord) -> HistoryQuery {
        HistoryQuery::from_record(record, &self.action_type, self.offset)
    }

    /// Issue exactly one history lookup for the record
    pub async fn check_exists(&self, record: &FailureRecord) -> Result<HistoryAnswer, GateError> {
        let query = self.query_for(record);
        info!(
            company_no = query.company_no,
            user_no = query.user_no,
            point_group_key = %query.point_group_key,
            insert_timestamp = %query.insert_timestamp,
            "Checking point history"
        );

        let response = self.service.history_exists(&query).await.map_err(|e| {
            error!(
                company_no = query.company_no,
                point_group_key = %query.point_group_key,
                error = %e,
                timeout = e.is_timeout(),
                "Failed to check point history"
            );
            GateError::from(e)
        })?;

        let answer = HistoryAnswer::from_data(response.data);
        match answer {
            HistoryAnswer::NotFound => info!(
                point_group_key = %query.point_group_key,
                "Point history not found, retry allowed"
            ),
            HistoryAnswer::Exists | HistoryAnswer::Unknown => warn!(
                company_no = query.company_no,
                point_group_key = %query.point_group_key,
                answer = %answer,
                status = response.status,
                "Point history already exists"
            ),
        }

        Ok(answer)
    }
}
