//! Mock server helpers for client testing

use std::time::Duration;

use cloudgate_client::{Client, ClientConfig, RetryConfig};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::constants::*;

/// Retry config with millisecond delays and no jitter
pub fn quick_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 10,
        backoff_factor: 2.0,
        jitter: false,
    }
}

/// Client config pointing at `base_url` with test credentials
pub fn test_config(base_url: &str, max_retries: u32) -> ClientConfig {
    ClientConfig::new(base_url, TEST_TOKEN)
        .with_user_agent(TEST_USER_AGENT)
        .with_request_timeout(Duration::from_secs(5))
        .with_retry(quick_retry(max_retries))
}

/// Client pointing at the mock server
pub fn test_client(server: &MockServer, max_retries: u32) -> Client {
    Client::new(test_config(&server.uri(), max_retries)).expect("valid test client")
}

pub fn instance_list() -> Value {
    json!({
        "data": [
            { "id": 123, "label": "web-1", "status": "running" },
            { "id": 456, "label": "db-1", "status": "offline" }
        ],
        "page": 1,
        "pages": 1,
        "results": 2
    })
}

/// GET `route` fails with `status` `fail_count` times, then returns `body`
pub async fn mock_flaky_get(
    server: &MockServer,
    route: &str,
    status: u16,
    fail_count: u64,
    body: Value,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// GET `route` always answers with `status`
pub async fn mock_failing_get(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Number of requests the server has seen
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
