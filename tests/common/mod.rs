//! Shared fixtures for the recovery integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use point_recovery::client::PointApiClient;
use point_recovery::config::{LedgerTransportPolicy, RecoveryConfig};
use point_recovery::recovery::RecoveryPipeline;

pub const HISTORY_PATH: &str = "/point/history/exists";
pub const LEDGER_PATH: &str = "/point/use";
pub const GROUP_KEY: &str = "e8d1a8d8cd874bbfa778";

/// Configuration pointed at a mock server, with a short HTTP timeout
pub fn config_for(server: &MockServer) -> RecoveryConfig {
    let mut config = RecoveryConfig::default();
    config.http.base_url = server.uri();
    config.http.timeout_ms = 500;
    config.consumer.poll_interval_ms = 20;
    config.consumer.visibility_timeout_seconds = 1;
    config
}

pub fn pipeline_for(config: &RecoveryConfig) -> RecoveryPipeline {
    let client = Arc::new(PointApiClient::new(&config.http).unwrap());
    RecoveryPipeline::from_config(config, client.clone(), client).unwrap()
}

pub fn redeliver_on_ledger_transport(mut config: RecoveryConfig) -> RecoveryConfig {
    config.consumer.ledger_transport_error = LedgerTransportPolicy::Redeliver;
    config
}

/// Failure message whose event happened `age` ago
pub fn failure_payload(age: Duration) -> Vec<u8> {
    failure_json(age).to_string().into_bytes()
}

pub fn failure_json(age: Duration) -> Value {
    json!({
        "companyNo": 35,
        "userNo": 33,
        "updateTimestamp": (Utc::now() - age).timestamp_millis(),
        "pointGroupKey": GROUP_KEY,
        "pointActionType": "U",
        "description": "user 33 concurrent 100 point deduction",
        "point": 100
    })
}

pub fn api_body(status: i32, message: &str, data: Value) -> Value {
    json!({ "status": status, "message": message, "data": data })
}

pub async fn mount_history(server: &MockServer, exists: Value, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_body(200, "Success", exists)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_ledger(server: &MockServer, status: i32, message: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(LEDGER_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(api_body(status, message, json!(null))),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Number of requests the server saw on `route`
pub async fn calls_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
