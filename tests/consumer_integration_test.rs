//! Consumer loop against the in-memory broker and mocked point services.

mod common;

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use point_recovery::messaging::InMemoryBroker;
use point_recovery::recovery::{HistoryAnswer, OutcomeReason, RecoveryConsumer, TerminalState};

fn consumer_for(server: &MockServer, broker: Arc<InMemoryBroker>) -> RecoveryConsumer {
    let config = config_for(server);
    let pipeline = pipeline_for(&config);
    RecoveryConsumer::new(broker, pipeline, config.consumer)
}

async fn run_for(consumer: RecoveryConsumer, window: std::time::Duration) -> point_recovery::ConsumerStats {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(consumer.run(rx));
    tokio::time::sleep(window).await;
    tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_reprocessing_a_committed_failure_does_not_deduct_twice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_body(200, "Success", json!(false))))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_history(&server, json!(true), 1).await;
    mount_ledger(&server, 200, "Success", 1).await;

    let broker = Arc::new(InMemoryBroker::new());
    let payload = failure_payload(Duration::hours(3));
    broker.publish(payload.clone());
    broker.publish(payload);

    let mut consumer = consumer_for(&server, broker.clone());
    let first = consumer.poll_once().await.unwrap().unwrap();
    let second = consumer.poll_once().await.unwrap().unwrap();

    assert!(first.retry_outcome().unwrap().succeeded);
    assert_eq!(
        second.reason,
        OutcomeReason::AlreadyApplied {
            answer: HistoryAnswer::Exists
        }
    );
    assert_eq!(broker.committed_ids().len(), 2);
    assert_eq!(calls_to(&server, LEDGER_PATH).await, 1);
}

#[tokio::test]
async fn test_skipped_failure_is_redelivered_and_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_history(&server, json!(false), 1).await;
    mount_ledger(&server, 200, "Success", 1).await;

    let broker = Arc::new(InMemoryBroker::new());
    let id = broker.publish(failure_payload(Duration::hours(1)));

    let mut consumer = consumer_for(&server, broker.clone());
    let first = consumer.poll_once().await.unwrap().unwrap();
    assert_eq!(first.terminal_state, TerminalState::Skipped);
    assert_eq!(first.delivery_count, 1);
    assert_eq!(broker.pending_count(), 1);

    // still claimed until the visibility timeout lapses
    assert!(consumer.poll_once().await.unwrap().is_none());

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = consumer.poll_once().await.unwrap().unwrap();
    assert_eq!(second.message_id, id);
    assert_eq!(second.delivery_count, 2);
    assert_eq!(second.terminal_state, TerminalState::Committed);
    assert_eq!(broker.committed_ids(), vec![id]);
}

#[tokio::test]
async fn test_run_drains_queue_and_reports_stats() {
    let server = MockServer::start().await;
    mount_history(&server, json!(false), 1).await;
    mount_ledger(&server, 200, "Success", 1).await;

    let broker = Arc::new(InMemoryBroker::new());
    broker.publish(failure_payload(Duration::hours(2)));
    broker.publish(failure_payload(Duration::hours(30)));
    broker.publish(b"invalid-message".to_vec());

    let stats = run_for(
        consumer_for(&server, broker.clone()),
        std::time::Duration::from_millis(500),
    )
    .await;

    assert_eq!(stats.received, 3);
    assert_eq!(stats.committed, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.commit_failures, 0);
    assert_eq!(broker.pending_count(), 0);
}

#[tokio::test]
async fn test_run_exits_when_shutdown_sender_is_dropped() {
    let server = MockServer::start().await;
    let broker = Arc::new(InMemoryBroker::new());
    let consumer = consumer_for(&server, broker);

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(consumer.run(rx));
    drop(tx);

    let stats = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.received, 0);
}
