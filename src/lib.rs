#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, pgmq in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Point Recovery
//!
//! Asynchronous recovery consumer for failed point deductions.
//!
//! ## Overview
//!
//! When the primary point service cannot complete a deduction it publishes a failure
//! message. This crate consumes those messages and, for each one, decides whether the
//! deduction has to be replayed against the ledger, while guaranteeing that a deduction
//! is never applied twice.
//!
//! ## Architecture
//!
//! Each message flows through a fixed pipeline:
//!
//! ```text
//! codec → recency window → history gate → request builder → retry executor
//!                                                                  ↓
//!                                                 commit / skip orchestrator
//! ```
//!
//! Only a message whose history lookup failed is left unacknowledged; every other path
//! commits. Redelivery comes from the pgmq visibility timeout.
//!
//! ## Module Organization
//!
//! - [`recovery`] - Pipeline stages, orchestrator and consumer loop
//! - [`messaging`] - Broker abstraction with pgmq and in-memory implementations
//! - [`client`] - HTTP client for the history and ledger services
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Console and JSON file logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use point_recovery::client::PointApiClient;
//! use point_recovery::config::ConfigLoader;
//! use point_recovery::messaging::InMemoryBroker;
//! use point_recovery::recovery::{RecoveryConsumer, RecoveryPipeline};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let client = Arc::new(PointApiClient::new(&config.http)?);
//! let pipeline = RecoveryPipeline::from_config(&config, client.clone(), client)?;
//!
//! let broker = Arc::new(InMemoryBroker::new());
//! let mut consumer = RecoveryConsumer::new(broker, pipeline, config.consumer.clone());
//! if let Some(report) = consumer.poll_once().await? {
//!     println!("{} -> {}", report.message_id, report.terminal_state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and wiremock-backed integration tests
//! ```
//!
//! pgmq tests run only when `TEST_DATABASE_URL` points at a PostgreSQL with the
//! pgmq extension installed.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod recovery;
pub mod utils;

pub use client::{ClientError, PointApiClient};
pub use config::{ConfigLoader, RecoveryConfig};
pub use error::{RecoveryError, RecoveryResult};
pub use messaging::{InMemoryBroker, MessageBroker, PgmqClient, QueueMessage};
pub use recovery::{
    ConsumerStats, PipelineReport, PipelineStage, RecoveryConsumer, RecoveryPipeline,
    TerminalState,
};
