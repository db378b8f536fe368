//! Failure message codec.
//!
//! Turns a raw queue payload into a [`FailureRecord`]. The codec fails closed: any
//! payload that does not match the failure message schema is rejected, and since no
//! amount of redelivery will fix it the orchestrator commits and drops it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::utils::time::epoch_millis_to_utc;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload is not a valid failure message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("updateTimestamp {0} is outside the representable date range")]
    TimestampOutOfRange(i64),
}

/// Wire shape published by the primary point service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointUseFailMessage {
    company_no: i32,
    user_no: i32,
    update_timestamp: i64,
    point_group_key: String,
    point_action_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    point: Option<i32>,
}

/// A failed deduction, as received. Fields are read-only once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    company_no: i32,
    user_no: i32,
    point: Option<i32>,
    action_type: String,
    group_key: String,
    occurred_at_millis: i64,
    occurred_at: DateTime<Utc>,
    description: Option<String>,
}

/// The fields that identify one logical deduction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity {
    pub company_no: i32,
    pub user_no: i32,
    pub group_key: String,
    pub action_type: String,
    pub occurred_at_millis: i64,
}

impl FailureRecord {
    pub fn company_no(&self) -> i32 {
        self.company_no
    }

    pub fn user_no(&self) -> i32 {
        self.user_no
    }

    pub fn point(&self) -> Option<i32> {
        self.point
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    pub fn occurred_at_millis(&self) -> i64 {
        self.occurred_at_millis
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            company_no: self.company_no,
            user_no: self.user_no,
            group_key: self.group_key.clone(),
            action_type: self.action_type.clone(),
            occurred_at_millis: self.occurred_at_millis,
        }
    }
}

impl TryFrom<PointUseFailMessage> for FailureRecord {
    type Error = DecodeError;

    fn try_from(message: PointUseFailMessage) -> Result<Self, Self::Error> {
        let occurred_at = epoch_millis_to_utc(message.update_timestamp)
            .ok_or(DecodeError::TimestampOutOfRange(message.update_timestamp))?;

        Ok(Self {
            company_no: message.company_no,
            user_no: message.user_no,
            point: message.point,
            action_type: message.point_action_type,
            group_key: message.point_group_key,
            occurred_at_millis: message.update_timestamp,
            occurred_at,
            description: message.description,
        })
    }
}

/// Stateless decoder, constructed once and handed to the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureCodec;

impl FailureCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode a raw payload. Failures are logged with the payload for forensic replay.
    pub fn decode(&self, raw: &[u8]) -> Result<FailureRecord, DecodeError> {
        let result = serde_json::from_slice::<PointUseFailMessage>(raw)
            .map_err(DecodeError::from)
            .and_then(FailureRecord::try_from);

        match &result {
            Ok(record) => debug!(record = ?record, "Transformed message"),
            Err(e) => error!(
                error = %e,
                payload = %String::from_utf8_lossy(raw),
                "Failed to transform message"
            ),
        }

        result
    }
}
