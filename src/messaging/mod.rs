//! # Messaging Module
//!
//! Queue plumbing for the recovery consumer: the [`MessageBroker`] seam, the pgmq
//! implementation used in production and an in-memory implementation for tests.

pub mod broker;
pub mod errors;
pub mod in_memory;
pub mod message;
pub mod pgmq_client;

pub use broker::MessageBroker;
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::InMemoryBroker;
pub use message::QueueMessage;
pub use pgmq_client::PgmqClient;
