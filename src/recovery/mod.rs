//! # Recovery Pipeline
//!
//! Stages that turn one failed point deduction into a commit or skip decision:
//!
//! - [`codec`] - raw payload to [`FailureRecord`]
//! - [`time_policy`] - 24 hour retry window
//! - [`history_gate`] - "was it actually applied?" lookup
//! - [`request_builder`] - ledger request construction
//! - [`executor`] - single retry attempt against the ledger
//! - [`orchestrator`] - stage sequencing and the commit/skip decision
//! - [`consumer`] - broker loop around the pipeline

pub mod codec;
pub mod consumer;
pub mod executor;
pub mod history_gate;
pub mod orchestrator;
pub mod request_builder;
pub mod time_policy;

pub use codec::{DecodeError, FailureCodec, FailureRecord, RecordIdentity};
pub use consumer::{ConsumerStats, RecoveryConsumer};
pub use executor::{LedgerService, RetryExecutor, RetryFailureKind, RetryOutcome};
pub use history_gate::{GateError, HistoryAnswer, HistoryQuery, HistoryService, IdempotencyGate};
pub use orchestrator::{
    OutcomeReason, PipelineReport, PipelineStage, RecoveryPipeline, TerminalState,
};
pub use request_builder::{RetryRequest, RetryRequestBuilder};
pub use time_policy::RecencyPolicy;
