//! Per-message recovery pipeline.
//!
//! ```text
//! Received → Decoded → RecencyChecked → IdempotencyChecked → RequestBuilt → Retried
//!     │          │              │                                           │
//!     └ malformed└ stale        ├ exists / unknown ──────────► Committed ◄──┘
//!                               └ history unavailable ───────► Skipped
//! ```
//!
//! Every path ends in [`TerminalState::Committed`] (the message is acknowledged)
//! except a history lookup that produced no answer, which ends in
//! [`TerminalState::Skipped`] so the broker redelivers the message later. A ledger
//! transport failure commits by default and can be switched to skip with
//! [`LedgerTransportPolicy::Redeliver`].

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::codec::FailureCodec;
use super::executor::{LedgerService, RetryExecutor, RetryOutcome};
use super::history_gate::{HistoryAnswer, HistoryService, IdempotencyGate};
use super::request_builder::RetryRequestBuilder;
use super::time_policy::{age_millis, RecencyPolicy};
use crate::config::{ConfigResult, LedgerTransportPolicy, RecoveryConfig};
use crate::messaging::QueueMessage;

/// Pipeline stages, in order. A report names the last stage that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Received,
    Decoded,
    RecencyChecked,
    IdempotencyChecked,
    RequestBuilt,
    Retried,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Decoded => "decoded",
            PipelineStage::RecencyChecked => "recency_checked",
            PipelineStage::IdempotencyChecked => "idempotency_checked",
            PipelineStage::RequestBuilt => "request_built",
            PipelineStage::Retried => "retried",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// Acknowledge; the message is never seen again
    Committed,
    /// Leave unacknowledged for broker redelivery
    Skipped,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalState::Committed => f.write_str("committed"),
            TerminalState::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeReason {
    Malformed { error: String },
    Stale { age_millis: i128 },
    AlreadyApplied { answer: HistoryAnswer },
    GateUnavailable { error: String },
    Retried(RetryOutcome),
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeReason::Malformed { error } => write!(f, "malformed payload: {error}"),
            OutcomeReason::Stale { age_millis } => write!(f, "stale message, age {age_millis}ms"),
            OutcomeReason::AlreadyApplied { answer } => {
                write!(f, "already applied (history answer: {answer})")
            }
            OutcomeReason::GateUnavailable { error } => {
                write!(f, "history check unavailable: {error}")
            }
            OutcomeReason::Retried(outcome) => write!(f, "retry {outcome}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub message_id: i64,
    pub delivery_count: i32,
    pub last_stage: PipelineStage,
    pub terminal_state: TerminalState,
    pub reason: OutcomeReason,
}

impl PipelineReport {
    pub fn should_commit(&self) -> bool {
        self.terminal_state == TerminalState::Committed
    }

    /// The retry outcome, when the pipeline got as far as calling the ledger
    pub fn retry_outcome(&self) -> Option<&RetryOutcome> {
        match &self.reason {
            OutcomeReason::Retried(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Sequences the recovery stages for one message at a time
#[derive(Debug)]
pub struct RecoveryPipeline {
    codec: FailureCodec,
    recency: RecencyPolicy,
    gate: IdempotencyGate,
    builder: RetryRequestBuilder,
    executor: RetryExecutor,
    ledger_transport_policy: LedgerTransportPolicy,
}

impl RecoveryPipeline {
    pub fn new(
        codec: FailureCodec,
        recency: RecencyPolicy,
        gate: IdempotencyGate,
        builder: RetryRequestBuilder,
        executor: RetryExecutor,
        ledger_transport_policy: LedgerTransportPolicy,
    ) -> Self {
        Self {
            codec,
            recency,
            gate,
            builder,
            executor,
            ledger_transport_policy,
        }
    }

    /// Wire the stages from configuration around the given remote services
    pub fn from_config(
        config: &RecoveryConfig,
        history: Arc<dyn HistoryService>,
        ledger: Arc<dyn LedgerService>,
    ) -> ConfigResult<Self> {
        let offset = config.policy.utc_offset()?;

        Ok(Self::new(
            FailureCodec::new(),
            RecencyPolicy::new(config.policy.max_message_age()),
            IdempotencyGate::new(history, config.policy.history_action_type.clone(), offset),
            RetryRequestBuilder::new(offset),
            RetryExecutor::new(ledger),
            config.consumer.ledger_transport_error,
        ))
    }

    /// Run one message through every stage it qualifies for
    pub async fn process(&self, message: &QueueMessage, now: DateTime<Utc>) -> PipelineReport {
        let report = |last_stage, terminal_state, reason| PipelineReport {
            message_id: message.message_id,
            delivery_count: message.delivery_count,
            last_stage,
            terminal_state,
            reason,
        };

        info!(payload = %message.payload_text(), "Received failed message");

        let record = match self.codec.decode(&message.payload) {
            Ok(record) => record,
            Err(e) => {
                return report(
                    PipelineStage::Received,
                    TerminalState::Committed,
                    OutcomeReason::Malformed {
                        error: e.to_string(),
                    },
                )
            }
        };

        let now_millis = now.timestamp_millis();
        if !self
            .recency
            .is_eligible(record.occurred_at_millis(), now_millis)
        {
            info!(
                update_timestamp = record.occurred_at_millis(),
                "Skipping old message"
            );
            return report(
                PipelineStage::Decoded,
                TerminalState::Committed,
                OutcomeReason::Stale {
                    age_millis: age_millis(record.occurred_at_millis(), now_millis),
                },
            );
        }

        let answer = match self.gate.check_exists(&record).await {
            Ok(answer) => answer,
            Err(e) => {
                return report(
                    PipelineStage::RecencyChecked,
                    TerminalState::Skipped,
                    OutcomeReason::GateUnavailable {
                        error: e.to_string(),
                    },
                )
            }
        };

        if !answer.allows_retry() {
            return report(
                PipelineStage::IdempotencyChecked,
                TerminalState::Committed,
                OutcomeReason::AlreadyApplied { answer },
            );
        }

        let request = self.builder.build(&record);
        let outcome = self.executor.execute(&request).await;

        let terminal_state = if outcome.is_transport_failure()
            && self.ledger_transport_policy == LedgerTransportPolicy::Redeliver
        {
            warn!("Ledger unreachable, leaving message for redelivery");
            TerminalState::Skipped
        } else {
            TerminalState::Committed
        };

        report(
            PipelineStage::Retried,
            terminal_state,
            OutcomeReason::Retried(outcome),
        )
    }
}
