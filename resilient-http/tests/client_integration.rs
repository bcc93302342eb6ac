//! End-to-end tests against a local mock server.

use resilient_http::{
    CircuitBreakerConfig, CircuitState, ClientConfig, ErrorCode, ResilientClient, RetryConfig,
    StatusCode,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str, retries: u32) -> ResilientClient {
    let config = ClientConfig::builder()
        .base_url(base_url)
        .retry(RetryConfig::exponential(retries, Duration::from_millis(10)).without_jitter())
        .circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_secs(60)))
        .build();
    assert_ok!(ResilientClient::new(config))
}

#[tokio::test]
async fn retries_service_unavailable_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), 3);
    let response = assert_ok!(client.get("/users").send().await);

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.is_json());
    let users: serde_json::Value = assert_ok!(response.json());
    assert_eq!(users[0]["id"], 1);
    assert_eq!(client.circuit_breaker_state().failure_count, 0);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), 3);
    let err = client.get("/missing").send().await.unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.attempts(), 1);
    assert!(err.to_string().contains("no such thing"));
}

#[tokio::test]
async fn slow_responses_time_out_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = client(&server.uri(), 1);
    let err = client
        .get("/slow")
        .timeout(Duration::from_millis(50))
        .send()
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.attempts(), 2);
}

#[tokio::test]
async fn post_json_sends_body_and_content_type() {
    let server = MockServer::start().await;
    let order = serde_json::json!({"item": "widget", "quantity": 5});
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .and(body_json(&order))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri(), 0);
    let response = assert_ok!(client.post("/orders").json(&order).send().await);

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn refused_connection_reports_error_code() {
    let port = {
        let listener = assert_ok!(std::net::TcpListener::bind("127.0.0.1:0"));
        assert_ok!(listener.local_addr()).port()
    };

    let retries = Arc::new(AtomicU32::new(0));
    let seen = retries.clone();
    let config = ClientConfig::builder()
        .base_url(format!("http://127.0.0.1:{}", port))
        .retry(RetryConfig::exponential(1, Duration::from_millis(10)).without_jitter())
        .on_retry(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let client = assert_ok!(ResilientClient::new(config));

    let err = client.get("/").send().await.unwrap_err();

    assert_eq!(err.error_code(), Some(ErrorCode::ConnectionRefused));
    assert_eq!(err.attempts(), 2);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn circuit_opens_and_stops_reaching_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server.uri(), 0);
    for _ in 0..3 {
        client.get("/flaky").send().await.unwrap_err();
    }
    assert_eq!(client.circuit_breaker_state().state, CircuitState::Open);

    let err = client.get("/flaky").send().await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.attempts(), 0);
}
