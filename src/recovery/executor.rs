//! Retry executor.
//!
//! Sends one deduction to the ledger and reduces whatever comes back to a
//! [`RetryOutcome`]. Nothing escapes as an error: once a message has passed the
//! idempotency gate the pipeline only needs to know whether this single attempt worked.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::request_builder::RetryRequest;
use crate::client::{ApiResponse, ClientError, ClientResult, PointApiClient};

pub const SUCCESS_STATUS: i32 = 200;
pub const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryFailureKind {
    /// The ledger answered, but not with success
    Rejected,
    /// No usable answer: connect failure, timeout, gateway 502/503/504 or no free slot
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryOutcome {
    pub succeeded: bool,
    pub status_code: Option<i32>,
    pub message: String,
    pub failure: Option<RetryFailureKind>,
}

impl RetryOutcome {
    pub fn success(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            status_code: Some(status_code),
            message: message.into(),
            failure: None,
        }
    }

    pub fn rejected(status_code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            status_code,
            message: message.into(),
            failure: Some(RetryFailureKind::Rejected),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            status_code: None,
            message: message.into(),
            failure: Some(RetryFailureKind::Transport),
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.failure == Some(RetryFailureKind::Transport)
    }

    /// Success iff the body carries both the success status and the success marker
    pub fn classify<T>(response: &ApiResponse<T>) -> Self {
        if response.status == SUCCESS_STATUS && response.message == SUCCESS_MESSAGE {
            Self::success(response.status, response.message.clone())
        } else {
            Self::rejected(Some(response.status), response.message.clone())
        }
    }

    pub fn from_client_error(err: &ClientError) -> Self {
        match err {
            ClientError::ApiError { status, message } => {
                let status_code = Some(i32::from(*status));
                if err.is_transport() {
                    Self {
                        status_code,
                        ..Self::transport(message.clone())
                    }
                } else {
                    Self::rejected(status_code, message.clone())
                }
            }
            e if e.is_transport() => Self::transport(e.to_string()),
            e => Self::rejected(None, e.to_string()),
        }
    }
}

impl fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.succeeded { "succeeded" } else { "failed" };
        match self.status_code {
            Some(status) => write!(f, "{verdict} (status={status}, message={})", self.message),
            None => write!(f, "{verdict} ({})", self.message),
        }
    }
}

/// Remote point deduction
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn use_points(
        &self,
        request: &RetryRequest,
    ) -> ClientResult<ApiResponse<serde_json::Value>>;
}

#[async_trait]
impl LedgerService for PointApiClient {
    async fn use_points(
        &self,
        request: &RetryRequest,
    ) -> ClientResult<ApiResponse<serde_json::Value>> {
        self.post_json(self.ledger_path(), request).await
    }
}

pub struct RetryExecutor {
    ledger: Arc<dyn LedgerService>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor").finish_non_exhaustive()
    }
}

impl RetryExecutor {
    pub fn new(ledger: Arc<dyn LedgerService>) -> Self {
        Self { ledger }
    }

    /// Attempt the deduction exactly once
    pub async fn execute(&self, request: &RetryRequest) -> RetryOutcome {
        info!(
            company_no = request.company_no,
            user_no = request.user_no,
            point = request.point,
            point_group_key = %request.point_group_key,
            "Retrying point use"
        );

        match self.ledger.use_points(request).await {
            Ok(response) => {
                let outcome = RetryOutcome::classify(&response);
                if outcome.succeeded {
                    info!(data = ?response.data, "Point use retry succeeded");
                } else {
                    warn!(
                        status = response.status,
                        message = %response.message,
                        "Point use retry rejected"
                    );
                }
                outcome
            }
            Err(e) => {
                let outcome = RetryOutcome::from_client_error(&e);
                error!(
                    error = %e,
                    failure = ?outcome.failure,
                    "Point use retry call failed"
                );
                outcome
            }
        }
    }
}
