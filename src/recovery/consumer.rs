//! Consumer loop.
//!
//! Pulls one message at a time from the broker, runs it through the
//! [`RecoveryPipeline`] and acknowledges it when the report says so. Messages are
//! processed strictly in sequence; a skipped message is simply not committed and
//! comes back once its visibility timeout expires.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::orchestrator::{PipelineReport, RecoveryPipeline};
use crate::config::ConsumerConfig;
use crate::error::RecoveryResult;
use crate::logging::{log_error, log_pipeline_outcome};
use crate::messaging::{MessageBroker, QueueMessage};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub received: u64,
    pub committed: u64,
    pub skipped: u64,
    pub commit_failures: u64,
    pub receive_failures: u64,
}

pub struct RecoveryConsumer {
    broker: Arc<dyn MessageBroker>,
    pipeline: RecoveryPipeline,
    config: ConsumerConfig,
    stats: ConsumerStats,
}

impl std::fmt::Debug for RecoveryConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryConsumer")
            .field("broker", &self.broker.client_type())
            .field("topic", &self.config.topic)
            .field("consumer_group", &self.config.consumer_group)
            .field("stats", &self.stats)
            .finish()
    }
}

impl RecoveryConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        pipeline: RecoveryPipeline,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            broker,
            pipeline,
            config,
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    /// Receive and fully handle at most one message.
    ///
    /// Returns `Ok(None)` when the queue had nothing visible. Commit failures are
    /// logged and counted; the message will be redelivered and the history gate keeps
    /// the second pass from deducting twice.
    pub async fn poll_once(&mut self) -> RecoveryResult<Option<PipelineReport>> {
        let message = match self.broker.receive(self.config.visibility_timeout()).await {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.receive_failures += 1;
                return Err(e.into());
            }
        };
        self.stats.received += 1;

        let span = info_span!(
            "recovery_message",
            message_id = message.message_id,
            delivery_count = message.delivery_count,
            processing_id = %Uuid::new_v4(),
            consumer_group = %self.config.consumer_group,
        );

        let report = self.handle(&message).instrument(span).await;
        Ok(Some(report))
    }

    async fn handle(&mut self, message: &QueueMessage) -> PipelineReport {
        if message.is_redelivery() {
            warn!(
                delivery_count = message.delivery_count,
                enqueued_at = %message.enqueued_at,
                "Processing redelivered message"
            );
        }

        let report = self.pipeline.process(message, Utc::now()).await;
        log_pipeline_outcome(&report);

        if report.should_commit() {
            match self.broker.commit(message).await {
                Ok(()) => {
                    self.stats.committed += 1;
                    debug!("Message committed");
                }
                Err(e) => {
                    self.stats.commit_failures += 1;
                    log_error(
                        "recovery_consumer",
                        "commit",
                        &e.to_string(),
                        Some("message will be redelivered"),
                    );
                }
            }
        } else {
            self.stats.skipped += 1;
            info!(
                visibility_timeout_seconds = self.config.visibility_timeout_seconds,
                "Message left for redelivery"
            );
        }

        report
    }

    /// Consume until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        info!(
            topic = %self.config.topic,
            queue = %self.config.queue_name(),
            consumer_group = %self.config.consumer_group,
            broker = self.broker.client_type(),
            "Recovery consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "Failed to receive message");
                    true
                }
            };

            if !idle {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        info!(stats = ?self.stats, "Recovery consumer stopped");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiResponse, ClientError, ClientResult};
    use crate::config::RecoveryConfig;
    use crate::error::RecoveryError;
    use crate::messaging::{InMemoryBroker, MessagingError, MessagingResult};
    use crate::recovery::executor::LedgerService;
    use crate::recovery::history_gate::{HistoryQuery, HistoryService};
    use crate::recovery::request_builder::RetryRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedHistory(Option<bool>);

    #[async_trait]
    impl HistoryService for FixedHistory {
        async fn history_exists(&self, _query: &HistoryQuery) -> ClientResult<ApiResponse<bool>> {
            match self.0 {
                Some(exists) => Ok(ApiResponse {
                    status: 200,
                    message: "Success".to_string(),
                    data: Some(exists),
                }),
                None => Err(ClientError::Timeout {
                    operation: "history".to_string(),
                }),
            }
        }
    }

    struct OkLedger;

    #[async_trait]
    impl LedgerService for OkLedger {
        async fn use_points(
            &self,
            _request: &RetryRequest,
        ) -> ClientResult<ApiResponse<serde_json::Value>> {
            Ok(ApiResponse {
                status: 200,
                message: "Success".to_string(),
                data: None,
            })
        }
    }

    /// In-memory broker whose receives and commits can be made to fail
    #[derive(Default)]
    struct FlakyBroker {
        inner: InMemoryBroker,
        failing_receives: AtomicUsize,
        fail_commits: AtomicBool,
    }

    #[async_trait]
    impl MessageBroker for FlakyBroker {
        async fn receive(
            &self,
            visibility_timeout: Duration,
        ) -> MessagingResult<Option<QueueMessage>> {
            let remaining = self.failing_receives.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_receives.store(remaining - 1, Ordering::SeqCst);
                return Err(MessagingError::database_connection("connection reset"));
            }
            self.inner.receive(visibility_timeout).await
        }

        async fn commit(&self, message: &QueueMessage) -> MessagingResult<()> {
            if self.fail_commits.load(Ordering::SeqCst) {
                return Err(MessagingError::queue_operation(
                    "flaky",
                    "delete",
                    "lock timeout",
                ));
            }
            self.inner.commit(message).await
        }

        fn client_type(&self) -> &'static str {
            "flaky"
        }
    }

    fn consumer(broker: Arc<dyn MessageBroker>, history: Option<bool>) -> RecoveryConsumer {
        let mut config = RecoveryConfig::default();
        config.consumer.poll_interval_ms = 10;
        let pipeline = RecoveryPipeline::from_config(
            &config,
            Arc::new(FixedHistory(history)),
            Arc::new(OkLedger),
        )
        .unwrap();
        RecoveryConsumer::new(broker, pipeline, config.consumer)
    }

    fn fresh_payload() -> Vec<u8> {
        format!(
            r#"{{"companyNo":35,"userNo":34,"updateTimestamp":{},"pointGroupKey":"k","pointActionType":"U","point":10}}"#,
            Utc::now().timestamp_millis() - 60_000
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_poll_once_on_empty_queue() {
        let mut consumer = consumer(Arc::new(InMemoryBroker::new()), Some(false));
        assert!(consumer.poll_once().await.unwrap().is_none());
        assert_eq!(consumer.stats(), &ConsumerStats::default());
    }

    #[tokio::test]
    async fn test_committed_message_is_removed() {
        let broker = Arc::new(InMemoryBroker::new());
        let id = broker.publish(fresh_payload());
        let mut consumer = consumer(broker.clone(), Some(false));

        let report = consumer.poll_once().await.unwrap().unwrap();
        assert!(report.should_commit());
        assert_eq!(broker.committed_ids(), vec![id]);
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(consumer.stats().committed, 1);
    }

    #[tokio::test]
    async fn test_skipped_message_stays_pending() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.publish(fresh_payload());
        let mut consumer = consumer(broker.clone(), None);

        let report = consumer.poll_once().await.unwrap().unwrap();
        assert!(!report.should_commit());
        assert!(broker.committed_ids().is_empty());
        assert_eq!(broker.pending_count(), 1);
        assert_eq!(consumer.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.publish(b"not json".to_vec());
        let consumer = consumer(broker.clone(), Some(false));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(consumer.run(rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_counted_not_returned() {
        let broker = Arc::new(FlakyBroker::default());
        broker.fail_commits.store(true, Ordering::SeqCst);
        broker.inner.publish(fresh_payload());
        let mut consumer = consumer(broker.clone(), Some(false));

        let report = consumer.poll_once().await.unwrap().unwrap();
        assert!(report.should_commit());
        assert_eq!(consumer.stats().commit_failures, 1);
        assert_eq!(consumer.stats().committed, 0);
        assert_eq!(broker.inner.pending_count(), 1);
        assert!(broker.inner.committed_ids().is_empty());
    }

    #[tokio::test]
    async fn test_receive_failure_is_counted_and_recoverable() {
        let broker = Arc::new(FlakyBroker::default());
        broker.failing_receives.store(1, Ordering::SeqCst);
        broker.inner.publish(fresh_payload());
        let mut consumer = consumer(broker.clone(), Some(false));

        let err = consumer.poll_once().await.unwrap_err();
        assert!(matches!(err, RecoveryError::Messaging(_)));
        assert_eq!(consumer.stats().receive_failures, 1);
        assert_eq!(consumer.stats().received, 0);

        let report = consumer.poll_once().await.unwrap().unwrap();
        assert!(report.should_commit());
        assert_eq!(broker.inner.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_run_keeps_polling_through_broker_failures() {
        let broker = Arc::new(FlakyBroker::default());
        broker.failing_receives.store(3, Ordering::SeqCst);
        broker.inner.publish(b"not json".to_vec());
        let consumer = consumer(broker.clone(), Some(false));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(consumer.run(rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.receive_failures, 3);
        assert_eq!(stats.received, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(broker.inner.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_run_survives_commit_failures() {
        let broker = Arc::new(FlakyBroker::default());
        broker.fail_commits.store(true, Ordering::SeqCst);
        broker.inner.publish(b"not json".to_vec());
        broker.inner.publish(fresh_payload());
        let consumer = consumer(broker.clone(), Some(false));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(consumer.run(rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.commit_failures, 2);
        assert_eq!(stats.committed, 0);
        assert_eq!(broker.inner.pending_count(), 2);
    }
}
