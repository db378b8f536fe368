//! # Queue Message Envelope
//!
//! Broker-neutral view of one delivery. The payload stays as raw bytes; turning it into
//! a typed record is the codec's job, so a malformed payload still reaches the pipeline
//! and can be committed instead of poisoning the receive path.

use chrono::{DateTime, Utc};

/// One delivery of a queued message
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Broker-assigned id, stable across redeliveries
    pub message_id: i64,
    /// How many times this message has been handed out, including this one
    pub delivery_count: i32,
    pub enqueued_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl QueueMessage {
    pub fn new(message_id: i64, delivery_count: i32, enqueued_at: DateTime<Utc>, payload: Vec<u8>) -> Self {
        Self {
            message_id,
            delivery_count,
            enqueued_at,
            payload,
        }
    }

    /// True when the broker has handed this message out before
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// Lossy text view of the payload for logs
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
