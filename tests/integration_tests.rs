//! Integration tests using wiremock to simulate HTTP servers.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
use wirecall::interceptor::{HeaderInterceptor, LoggingInterceptor};
use wirecall::{BackoffStrategy, CachePolicy, Client, Error, RetryPolicy, TransportErrorKind};
use wiremock::matchers::{
    body_json, body_string, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn get_item() -> EndpointDescriptor {
    EndpointDescriptor::builder("get_item", Method::GET, "/items/{id}")
        .binding(ParameterBinding::path("id"))
        .build()
        .unwrap()
}

fn builder(server: &MockServer) -> wirecall::ClientBuilder {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .endpoint(get_item())
}

fn retry_on(statuses: impl IntoIterator<Item = u16>, max_attempts: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .retry_on_statuses(statuses)
        .backoff(BackoffStrategy::fixed(Duration::from_millis(10)))
        .build()
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    let response_data = TestData {
        id: 1,
        name: "Test".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response_data))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let response = client.call::<TestData>("get_item", vec![json!(1)]).await.unwrap();

    assert_eq!(response.data, response_data);
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
}

#[tokio::test]
async fn test_query_and_header_bindings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .and(query_param("page", "2"))
        .and(header("x-request-id", "abc"))
        .and(header("user-agent", "wirecall-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let search = EndpointDescriptor::builder("search", Method::GET, "/search")
        .binding(ParameterBinding::query("q"))
        .binding(ParameterBinding::query_map())
        .binding(ParameterBinding::header("X-Request-Id"))
        .build()
        .unwrap();
    let client = builder(&mock_server)
        .default_header("User-Agent", "wirecall-tests")
        .unwrap()
        .endpoint(search)
        .build()
        .unwrap();

    let response = client
        .call::<Vec<TestData>>(
            "search",
            vec![json!("rust lang"), json!({"page": 2, "unused": null}), json!("abc")],
        )
        .await
        .unwrap();
    assert!(response.data.is_empty());
}

#[tokio::test]
async fn test_json_body_request() {
    let mock_server = MockServer::start().await;

    let request_data = TestData {
        id: 0,
        name: "New".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "name": "New"})))
        .mount(&mock_server)
        .await;

    let create = EndpointDescriptor::builder("create_item", Method::POST, "/items")
        .binding(ParameterBinding::body())
        .build()
        .unwrap();
    let client = builder(&mock_server).endpoint(create).build().unwrap();

    let response = client
        .call::<TestData>("create_item", vec![serde_json::to_value(&request_data).unwrap()])
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.data.id, 1);
}

#[tokio::test]
async fn test_form_body_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=ada&note=a+%26+b"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let login = EndpointDescriptor::builder("login", Method::POST, "/login")
        .form_url_encoded()
        .binding(ParameterBinding::field("user"))
        .binding(ParameterBinding::field("note"))
        .build()
        .unwrap();
    let client = builder(&mock_server).endpoint(login).build().unwrap();

    let response = client
        .invoke("login", vec![json!("ada"), json!("a & b")])
        .unwrap()
        .execute_async()
        .await
        .unwrap();
    assert_eq!(response.status.as_u16(), 204);
    assert_eq!(response.data, serde_json::Value::Null);
}

#[tokio::test]
async fn test_multipart_body_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"title\""))
        .and(body_string_contains("quarterly report"))
        .and(body_string_contains("name=\"meta\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let upload = EndpointDescriptor::builder("upload", Method::POST, "/upload")
        .multipart()
        .binding(ParameterBinding::part("title"))
        .binding(ParameterBinding::part("meta"))
        .build()
        .unwrap();
    let client = builder(&mock_server).endpoint(upload).build().unwrap();

    client
        .invoke("upload", vec![json!("quarterly report"), json!({"pages": 3})])
        .unwrap()
        .execute_async()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_error_4xx() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/7"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let result = client.call::<TestData>("get_item", vec![json!(7)]).await;

    match result {
        Err(Error::HttpError {
            status,
            raw_response,
            ..
        }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(raw_response, "Not found");
        }
        _ => panic!("Expected HttpError, got {:?}", result),
    }
}

#[tokio::test]
async fn test_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let result = client.call::<TestData>("get_item", vec![json!(1)]).await;

    match result {
        Err(Error::DeserializationFailed {
            raw_response,
            status,
            ..
        }) => {
            assert_eq!(raw_response, "invalid json");
            assert_eq!(status.as_u16(), 200);
        }
        _ => panic!("Expected DeserializationFailed, got {:?}", result),
    }
}

#[tokio::test]
async fn test_retry_on_5xx() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    let response_data = TestData {
        id: 1,
        name: "Test".to_string(),
    };

    // First two requests fail with 503, third succeeds
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("Unavailable")
            } else {
                ResponseTemplate::new(200).set_body_json(&response_data)
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(retry_on([503], 4))
        .build()
        .unwrap();

    let response = client.call::<TestData>("get_item", vec![json!(1)]).await.unwrap();

    assert_eq!(response.data.id, 1);
    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(retry_on([502, 503], 3))
        .build()
        .unwrap();

    let result = client.call::<TestData>("get_item", vec![json!(1)]).await;

    match result {
        Err(Error::RetryExhausted { status, attempts }) => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(attempts, 3);
        }
        _ => panic!("Expected RetryExhausted, got {:?}", result),
    }
}

#[tokio::test]
async fn test_unlisted_status_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(retry_on([503], 3))
        .build()
        .unwrap();

    let result = client.call::<TestData>("get_item", vec![json!(1)]).await;
    assert!(matches!(result, Err(Error::HttpError { status, .. }) if status.as_u16() == 500));
}

#[tokio::test]
async fn test_timeout_is_classified_and_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "slow"}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .timeout(Duration::from_millis(50))
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(2)
                .retry_on_error(TransportErrorKind::Timeout)
                .build(),
        )
        .build()
        .unwrap();

    let err = client
        .call::<TestData>("get_item", vec![json!(1)])
        .await
        .unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_retry_after_header_is_respected() {
    let mock_server = MockServer::start().await;

    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First request returns 429 with Retry-After, second succeeds
    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "1")
                    .set_body_string("Rate limited")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(3)
                .retry_on_status(429)
                .backoff(BackoffStrategy::fixed(Duration::from_millis(10)))
                .respect_retry_after(Duration::from_secs(5))
                .build(),
        )
        .build()
        .unwrap();

    let start = Instant::now();
    let response = client.call::<TestData>("get_item", vec![json!(1)]).await.unwrap();

    assert_eq!(response.attempts, 2);
    // Should have waited approximately 1 second for the rate limit
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_retry_after_is_capped_by_max_wait() {
    let mock_server = MockServer::start().await;

    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429).insert_header("retry-after", "60")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(2)
                .retry_on_status(429)
                .respect_retry_after(Duration::from_millis(100))
                .build(),
        )
        .build()
        .unwrap();

    let start = Instant::now();
    let response = client.call::<TestData>("get_item", vec![json!(1)]).await.unwrap();

    assert_eq!(response.attempts, 2);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cached_response_skips_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "name": "Cached"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .cache_policy(CachePolicy::new(Duration::from_secs(60)))
        .build()
        .unwrap();

    let first = client.call::<TestData>("get_item", vec![json!(3)]).await.unwrap();
    let second = client.call::<TestData>("get_item", vec![json!(3)]).await.unwrap();

    assert_eq!(first.data, second.data);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.attempts, 0);
}

#[tokio::test]
async fn test_interceptors_reach_the_wire() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/1"))
        .and(header("authorization", "Bearer token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Secret"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .interceptor(LoggingInterceptor)
        .interceptor(HeaderInterceptor::new("Authorization", "Bearer token").unwrap())
        .build()
        .unwrap();

    let response = client.call::<TestData>("get_item", vec![json!(1)]).await.unwrap();
    assert_eq!(response.data.name, "Secret");
}

#[test]
fn test_blocking_execute_against_server() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock_server = runtime.block_on(MockServer::start());

    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/items/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Sync"})),
            )
            .mount(&mock_server),
    );

    let client = builder(&mock_server).build().unwrap();
    let response = client
        .invoke("get_item", vec![json!(5)])
        .unwrap()
        .execute_as::<TestData>()
        .unwrap();

    assert_eq!(response.data.name, "Sync");
}
