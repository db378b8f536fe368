//! # PostgreSQL Message Queue Client (pgmq-rs)
//!
//! [`MessageBroker`] implementation on top of the pgmq-rs crate. pgmq's visibility
//! timeout gives the redelivery contract the consumer relies on: a message read but
//! never deleted or archived becomes visible again once the timeout lapses.

use async_trait::async_trait;
use pgmq::PGMQueue;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::broker::MessageBroker;
use super::errors::{MessagingError, MessagingResult};
use super::message::QueueMessage;
use crate::config::{CommitMode, QueueConfig};

/// pgmq-rs based broker bound to a single queue
#[derive(Debug, Clone)]
pub struct PgmqClient {
    pgmq: PGMQueue,
    queue_name: String,
    commit_mode: CommitMode,
}

impl PgmqClient {
    /// Connect with a dedicated pool sized from configuration
    pub async fn connect(
        config: &QueueConfig,
        queue_name: impl Into<String>,
        commit_mode: CommitMode,
    ) -> MessagingResult<Self> {
        info!("🚀 Connecting to pgmq using pgmq-rs crate");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| MessagingError::database_connection(e.to_string()))?;

        let client = Self::new_with_pool(pool, queue_name, commit_mode).await;

        info!(queue = %client.queue_name, "✅ Connected to pgmq using pgmq-rs");
        Ok(client)
    }

    /// Create client using existing connection pool (BYOP - Bring Your Own Pool)
    pub async fn new_with_pool(
        pool: sqlx::PgPool,
        queue_name: impl Into<String>,
        commit_mode: CommitMode,
    ) -> Self {
        Self {
            pgmq: PGMQueue::new_with_pool(pool).await,
            queue_name: queue_name.into(),
            commit_mode,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Create the queue if it doesn't exist
    pub async fn ensure_queue(&self) -> MessagingResult<()> {
        debug!("📋 Ensuring queue exists: {}", self.queue_name);

        self.pgmq.create(&self.queue_name).await.map_err(|e| {
            MessagingError::queue_operation(&self.queue_name, "create", e.to_string())
        })?;

        info!("✅ Queue ready: {}", self.queue_name);
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for PgmqClient {
    async fn receive(&self, visibility_timeout: Duration) -> MessagingResult<Option<QueueMessage>> {
        let vt = i32::try_from(visibility_timeout.as_secs()).unwrap_or(i32::MAX);

        let message = self
            .pgmq
            .read::<serde_json::Value>(&self.queue_name, Some(vt))
            .await
            .map_err(|e| MessagingError::queue_operation(&self.queue_name, "read", e.to_string()))?;

        let Some(message) = message else {
            return Ok(None);
        };

        let payload = serde_json::to_vec(&message.message)
            .map_err(|e| MessagingError::message_serialization(e.to_string()))?;

        debug!(
            queue = %self.queue_name,
            message_id = message.msg_id,
            read_count = message.read_ct,
            "📨 Received message"
        );

        Ok(Some(QueueMessage::new(
            message.msg_id,
            message.read_ct,
            message.enqueued_at,
            payload,
        )))
    }

    async fn commit(&self, message: &QueueMessage) -> MessagingResult<()> {
        let (operation, result) = match self.commit_mode {
            CommitMode::Delete => (
                "delete",
                self.pgmq.delete(&self.queue_name, message.message_id).await,
            ),
            CommitMode::Archive => (
                "archive",
                self.pgmq.archive(&self.queue_name, message.message_id).await,
            ),
        };

        let affected = result.map_err(|e| {
            MessagingError::queue_operation(&self.queue_name, operation, e.to_string())
        })?;

        if affected == 0 {
            warn!(
                queue = %self.queue_name,
                message_id = message.message_id,
                operation = operation,
                "Commit matched no message; it was already acknowledged"
            );
        } else {
            debug!(
                queue = %self.queue_name,
                message_id = message.message_id,
                operation = operation,
                "✅ Message committed"
            );
        }

        Ok(())
    }

    fn client_type(&self) -> &'static str {
        "pgmq"
    }
}
