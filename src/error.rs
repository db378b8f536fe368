//! Error types for the point recovery consumer.
//!
//! Each layer owns its own error enum; this module collects them behind
//! [`RecoveryError`] for the consumer loop and the binary. Pipeline stages never
//! return these to the orchestrator's decision logic: remote failures are turned into
//! typed outcomes at the stage boundary (see [`crate::recovery`]).

use thiserror::Error;

pub use crate::client::ClientError;
pub use crate::config::ConfigurationError;
pub use crate::messaging::MessagingError;
pub use crate::recovery::codec::DecodeError;
pub use crate::recovery::history_gate::GateError;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
    #[error("HTTP client error: {0}")]
    Client(#[from] ClientError),
}

pub type RecoveryResult<T> = std::result::Result<T, RecoveryError>;
