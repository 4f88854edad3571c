#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fieldsync_common::resilience::RetryConfig;
use fieldsync_common::testing::StaticCredentialSource;
use fieldsync_domain::SyncTarget;
use fieldsync_infra::{ApiClient, HttpClient};
use serde_json::{json, Value};

/// Millisecond backoff so retry tests finish quickly.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(max_attempts)
        .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(10))
        .no_jitter()
        .build()
        .expect("retry config should be valid")
}

pub fn api_client(credentials: Arc<StaticCredentialSource>, max_attempts: u32) -> Arc<ApiClient> {
    let http = HttpClient::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("http client should build");
    Arc::new(ApiClient::new(http, credentials, fast_retry(max_attempts)))
}

/// Attribute target pointed at a mock server.
pub fn attributes_target(base_url: &str) -> SyncTarget {
    SyncTarget::user_attributes(base_url, "group-1")
}

/// `count` attribute records with ids `user-{start}` onwards.
pub fn attribute_records(start: usize, count: usize) -> Vec<Value> {
    (start..start + count)
        .map(|n| json!({"external_id": format!("user-{n:03}"), "plan": "free"}))
        .collect()
}
