//! Integration tests for the retrying client
//!
//! Tests cover:
//! - Request headers and bodies sent to the API
//! - Error classification of API responses
//! - Retry behaviour per error kind
//! - Transport failures and per-attempt timeouts
//! - Cancellation and deadlines from the caller's context

mod common;

use std::net::TcpListener;
use std::time::Duration;

use cloudgate_client::{
    ApiRequest, CancelReason, CancellationToken, Client, Error, RetryConfig, RetryContext,
};
use common::*;
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Instance {
    id: u64,
    label: String,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    data: Vec<Instance>,
}

// ============================================================================
// Request Shape
// ============================================================================

#[tokio::test]
async fn test_sends_auth_and_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .and(header("user-agent", TEST_USER_AGENT))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_list()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 3);
    let list: InstanceList = client
        .fetch(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap();

    assert_eq!(list.data.len(), 2);
    assert_eq!(list.data[0].id, 123);
    assert_eq!(list.data[1].label, "db-1");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    let payload = json!({ "label": "data", "size": 20, "region": "us-east" });

    Mock::given(method("POST"))
        .and(path(VOLUMES_PATH))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 77, "label": "data" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 0);
    let request = ApiRequest::post("create_volume", VOLUMES_PATH, &payload).unwrap();
    let created: Value = client.fetch(&RetryContext::new(), &request).await.unwrap();

    assert_eq!(created["id"], 77);
}

#[tokio::test]
async fn test_delete_without_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/linode/instances/123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 3);
    client
        .dispatch(
            &RetryContext::new(),
            &ApiRequest::delete("delete_instance", "/linode/instances/123"),
        )
        .await
        .unwrap();
}

// ============================================================================
// Classification and Retry Decisions
// ============================================================================

#[tokio::test]
async fn test_authentication_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 5);
    let err = client
        .fetch::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    let api = err.api().expect("API error");
    assert_eq!(api.status_code, 401);
    assert!(api.is_authentication());
    assert!(api.message.contains("authentication"));
}

#[tokio::test]
async fn test_forbidden_and_not_found_are_not_retried() {
    for status in [403, 404] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 5);
        let err = client
            .dispatch(
                &RetryContext::new(),
                &ApiRequest::get("list_instances", INSTANCES_PATH),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(status));
    }
}

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let server = MockServer::start().await;
    mock_flaky_get(&server, INSTANCES_PATH, 500, 2, instance_list()).await;

    let client = test_client(&server, 3);
    let list: InstanceList = client
        .fetch(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap();

    assert_eq!(list.data.len(), 2);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    mock_failing_get(&server, INSTANCES_PATH, 503).await;

    let client = test_client(&server, 2);
    let err = client
        .fetch::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(503));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_rate_limit_retried() {
    let server = MockServer::start().await;
    mock_flaky_get(&server, INSTANCES_PATH, 429, 1, instance_list()).await;

    let client = test_client(&server, 2);
    let result: Value = client
        .fetch(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap();

    assert_eq!(result["results"], 2);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_rate_limit_message_mentions_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 0);
    let err = client
        .fetch::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    let api = err.api().expect("API error");
    assert!(api.is_rate_limit());
    assert!(api.message.contains("30 seconds"), "got: {}", api.message);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn test_error_envelope_populates_message_and_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VOLUMES_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                { "field": "size", "reason": "Size must be between 10 and 10240" },
                { "field": "label", "reason": "Label is too long" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 3);
    let request = ApiRequest::post("create_volume", VOLUMES_PATH, &json!({ "size": 1 })).unwrap();
    let err = client
        .fetch::<Value>(&RetryContext::new(), &request)
        .await
        .unwrap_err();

    let api = err.api().expect("API error");
    assert_eq!(api.status_code, 400);
    assert_eq!(api.message, "Size must be between 10 and 10240");
    assert_eq!(api.field.as_deref(), Some("size"));
}

#[tokio::test]
async fn test_decode_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": "not-a-list" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 3);
    let err = client
        .fetch::<InstanceList>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { ref operation, .. } if operation == "list_instances"));
}

#[tokio::test]
async fn test_per_call_retry_override() {
    let server = MockServer::start().await;
    mock_failing_get(&server, INSTANCES_PATH, 500).await;

    let client = test_client(&server, 5);
    let err = client
        .fetch_with::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
            &RetryConfig::no_retry(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert_eq!(request_count(&server).await, 1);
}

// ============================================================================
// Transport Failures
// ============================================================================

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = Client::new(test_config(&format!("http://127.0.0.1:{}", port), 1)).unwrap();
    let err = client
        .fetch::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    match &err {
        Error::Network { operation, .. } => assert_eq!(operation, "list_instances"),
        other => panic!("expected network error, got {:?}", other),
    }
    assert!(err.is_network_error());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_response_hits_attempt_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(instance_list())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), 1).with_request_timeout(Duration::from_millis(200));
    let client = Client::new(config).unwrap();

    let err = client
        .fetch::<Value>(
            &RetryContext::new(),
            &ApiRequest::get("list_instances", INSTANCES_PATH),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout_error(), "got: {:?}", err);
    assert!(err.is_network_error());
}

// ============================================================================
// Cancellation and Deadlines
// ============================================================================

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let ctx = RetryContext::with_token(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let client = test_client(&server, 3);
    let started = std::time::Instant::now();
    let err = client
        .dispatch(&ctx, &ApiRequest::get("list_instances", INSTANCES_PATH))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        Error::Cancelled {
            attempts,
            reason,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 0);
            assert_eq!(reason, CancelReason::Cancelled);
            assert!(last_error.is_none());
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deadline_stops_backoff() {
    let server = MockServer::start().await;
    mock_failing_get(&server, INSTANCES_PATH, 503).await;

    let retry = RetryConfig {
        max_retries: 5,
        base_delay_ms: 5_000,
        max_delay_ms: 30_000,
        backoff_factor: 2.0,
        jitter: false,
    };
    let client = Client::new(test_config(&server.uri(), 0).with_retry(retry)).unwrap();
    let ctx = RetryContext::new().with_timeout(Duration::from_millis(300));

    let err = client
        .fetch::<Value>(&ctx, &ApiRequest::get("list_instances", INSTANCES_PATH))
        .await
        .unwrap_err();

    match err {
        Error::Cancelled {
            operation,
            attempts,
            reason,
            last_error,
        } => {
            assert_eq!(operation, "list_instances");
            assert_eq!(attempts, 1);
            assert_eq!(reason, CancelReason::DeadlineExceeded);
            assert_eq!(last_error.and_then(|e| e.status_code()), Some(503));
        }
        other => panic!("expected deadline, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 1);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_list()))
        .expect(8)
        .mount(&server)
        .await;

    let client = test_client(&server, 0);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .fetch::<InstanceList>(
                    &RetryContext::new(),
                    &ApiRequest::get("list_instances", INSTANCES_PATH),
                )
                .await
        }));
    }

    for handle in handles {
        let list = handle.await.unwrap().unwrap();
        assert_eq!(list.data.len(), 2);
    }
}
