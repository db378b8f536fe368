//! # In-Memory Broker
//!
//! In-process [`MessageBroker`] with the same visibility timeout semantics as pgmq.
//! Used by the integration tests and for local dry runs without PostgreSQL.
//!
//! ```rust
//! use point_recovery::messaging::{InMemoryBroker, MessageBroker};
//! use std::time::Duration;
//!
//! # tokio_test_block_on(async {
//! let broker = InMemoryBroker::new();
//! broker.publish(br#"{"companyNo":1}"#.to_vec());
//! let message = broker.receive(Duration::from_secs(30)).await.unwrap().unwrap();
//! broker.commit(&message).await.unwrap();
//! assert_eq!(broker.pending_count(), 0);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use super::broker::MessageBroker;
use super::errors::{MessagingError, MessagingResult};
use super::message::QueueMessage;

const QUEUE_NAME: &str = "in_memory";

#[derive(Debug, Clone)]
struct StoredMessage {
    id: i64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    delivery_count: i32,
    invisible_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    committed: Vec<i64>,
    next_id: i64,
}

/// In-memory broker for testing
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<QueueState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload, returning its message id
    pub fn publish(&self, payload: Vec<u8>) -> i64 {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;

        state.messages.push_back(StoredMessage {
            id,
            payload,
            enqueued_at: Utc::now(),
            delivery_count: 0,
            invisible_until: None,
        });
        id
    }

    /// Messages not yet committed, claimed or not
    pub fn pending_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Ids of committed messages, in commit order
    pub fn committed_ids(&self) -> Vec<i64> {
        self.state.lock().committed.clone()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn receive(&self, visibility_timeout: Duration) -> MessagingResult<Option<QueueMessage>> {
        let now = Utc::now();
        let visibility = chrono::Duration::from_std(visibility_timeout)
            .map_err(|e| MessagingError::queue_operation(QUEUE_NAME, "read", e.to_string()))?;

        let mut state = self.state.lock();
        let available = state.messages.iter_mut().find(|message| {
            message
                .invisible_until
                .map(|until| until <= now)
                .unwrap_or(true)
        });

        Ok(available.map(|message| {
            message.delivery_count += 1;
            message.invisible_until = Some(now + visibility);
            QueueMessage::new(
                message.id,
                message.delivery_count,
                message.enqueued_at,
                message.payload.clone(),
            )
        }))
    }

    async fn commit(&self, message: &QueueMessage) -> MessagingResult<()> {
        let mut state = self.state.lock();
        let position = state
            .messages
            .iter()
            .position(|stored| stored.id == message.message_id)
            .ok_or_else(|| MessagingError::MessageNotClaimed {
                queue_name: QUEUE_NAME.to_string(),
                message_id: message.message_id,
            })?;

        state.messages.remove(position);
        state.committed.push(message.message_id);
        Ok(())
    }

    fn client_type(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claimed_message_is_hidden_until_timeout() {
        let broker = InMemoryBroker::new();
        broker.publish(b"first".to_vec());

        let claimed = broker
            .receive(Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.delivery_count, 1);

        assert!(broker
            .receive(Duration::from_secs(60))
            .await
            .unwrap()
            .is_none());
        assert_eq!(broker.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_message_is_redelivered() {
        let broker = InMemoryBroker::new();
        let id = broker.publish(b"first".to_vec());

        let first = broker.receive(Duration::ZERO).await.unwrap().unwrap();
        let second = broker.receive(Duration::ZERO).await.unwrap().unwrap();

        assert_eq!(first.message_id, id);
        assert_eq!(second.message_id, id);
        assert_eq!(second.delivery_count, 2);
        assert!(second.is_redelivery());
    }

    #[tokio::test]
    async fn test_messages_are_delivered_in_order() {
        let broker = InMemoryBroker::new();
        let a = broker.publish(b"a".to_vec());
        let b = broker.publish(b"b".to_vec());

        let first = broker.receive(Duration::from_secs(60)).await.unwrap().unwrap();
        broker.commit(&first).await.unwrap();
        let second = broker.receive(Duration::from_secs(60)).await.unwrap().unwrap();

        assert_eq!(first.message_id, a);
        assert_eq!(second.message_id, b);
        assert_eq!(broker.committed_ids(), vec![a]);
    }

    #[tokio::test]
    async fn test_double_commit_is_rejected() {
        let broker = InMemoryBroker::new();
        broker.publish(b"a".to_vec());
        let message = broker.receive(Duration::from_secs(60)).await.unwrap().unwrap();

        broker.commit(&message).await.unwrap();
        let err = broker.commit(&message).await.unwrap_err();
        assert!(matches!(err, MessagingError::MessageNotClaimed { .. }));
    }
}
