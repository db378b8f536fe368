//! Broker abstraction used by the recovery consumer.
//!
//! Provides a common interface for the pgmq-backed broker and the in-memory broker,
//! so the consumer loop is identical in production and in tests.

use async_trait::async_trait;
use std::time::Duration;

use super::errors::MessagingResult;
use super::message::QueueMessage;

/// At-least-once message source with manual acknowledgment
///
/// A received message stays claimed for `visibility_timeout`. If it is not committed in
/// that window the broker hands it out again, with a higher delivery count.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Claim the oldest visible message, if any
    async fn receive(&self, visibility_timeout: Duration) -> MessagingResult<Option<QueueMessage>>;

    /// Acknowledge a message so it is never redelivered
    async fn commit(&self, message: &QueueMessage) -> MessagingResult<()>;

    /// Get client type for debugging/observability
    fn client_type(&self) -> &'static str;
}
