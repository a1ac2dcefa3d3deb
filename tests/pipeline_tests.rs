//! End-to-end pipeline tests against a scripted in-memory transport.

use async_trait::async_trait;
use http::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wirecall::descriptor::{EndpointDescriptor, ParameterBinding, ResponseTypeHint};
use wirecall::hydrate::{FieldDescriptor, TypeDescriptor};
use wirecall::interceptor::Chain;
use wirecall::{
    BackoffStrategy, CachePolicy, CallState, Client, ConcreteRequest, ConcreteResponse, Error,
    Interceptor, ObjectHydrator, RequestBody, Result, RetryPolicy, Transport, TransportError,
    TransportErrorKind,
};

type Outcome = std::result::Result<ConcreteResponse, TransportError>;

/// Replays canned outcomes and records every request it receives.
#[derive(Default)]
struct Scripted {
    outcomes: Mutex<VecDeque<Outcome>>,
    seen: Mutex<Vec<ConcreteRequest>>,
}

impl Scripted {
    fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    fn always(status: u16, body: &'static str) -> Arc<Self> {
        Self::new((0..16).map(|_| Ok(ConcreteResponse::with_status(status, body))))
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ConcreteRequest {
        self.seen.lock().unwrap()[index].clone()
    }
}

impl Transport for Scripted {
    fn execute(&self, request: &ConcreteRequest) -> Outcome {
        self.seen.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::new(
                    TransportErrorKind::Other,
                    "script ran out",
                ))
            })
    }
}

fn get_user() -> EndpointDescriptor {
    EndpointDescriptor::builder("get_user", Method::GET, "/users/{id}")
        .binding(ParameterBinding::path("id"))
        .build()
        .unwrap()
}

fn client(transport: &Arc<Scripted>) -> wirecall::ClientBuilder {
    Client::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .transport(Arc::clone(transport))
        .endpoint(get_user())
}

#[tokio::test]
async fn test_path_substitution_builds_url() {
    let transport = Scripted::always(200, "{}");
    let client = client(&transport).build().unwrap();

    let call = client.invoke("get_user", vec![json!(42)]).unwrap();
    assert_eq!(call.request().method(), Method::GET);
    assert_eq!(call.request().url().as_str(), "https://api.example.com/users/42");

    call.execute_async().await.unwrap();
    assert_eq!(transport.request(0).url().as_str(), "https://api.example.com/users/42");
}

#[test]
fn test_retry_until_success_blocking() {
    let transport = Scripted::new([
        Ok(ConcreteResponse::with_status(503, "")),
        Ok(ConcreteResponse::with_status(503, "")),
        Ok(ConcreteResponse::with_status(200, r#"{"id":42}"#)),
    ]);
    let client = client(&transport)
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(3)
                .retry_on_status(503)
                .backoff(BackoffStrategy::fixed(Duration::from_millis(10)))
                .build(),
        )
        .build()
        .unwrap();

    let response = client.invoke("get_user", vec![json!(42)]).unwrap().execute().unwrap();

    assert_eq!(transport.calls(), 3);
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.attempts, 3);
    assert_eq!(response.data, json!({"id": 42}));
}

#[test]
fn test_cache_serves_until_ttl_expires() {
    let transport = Scripted::always(200, r#"{"id":1}"#);
    let client = client(&transport)
        .cache_policy(CachePolicy::new(Duration::from_secs(1)))
        .build()
        .unwrap();

    let first = client.invoke("get_user", vec![json!(1)]).unwrap().execute().unwrap();
    assert!(!first.from_cache);
    assert_eq!(transport.calls(), 1);

    let second = client.invoke("get_user", vec![json!(1)]).unwrap().execute().unwrap();
    assert!(second.from_cache);
    assert_eq!(second.data, first.data);
    assert_eq!(transport.calls(), 1);

    std::thread::sleep(Duration::from_millis(1100));
    let third = client.invoke("get_user", vec![json!(1)]).unwrap().execute().unwrap();
    assert!(!third.from_cache);
    assert_eq!(transport.calls(), 2);
}

/// Adds a header on the way in and records its name on the way out.
struct Tagging {
    header: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Interceptor for Tagging {
    async fn intercept(&self, chain: Chain<'_>) -> Result<ConcreteResponse> {
        let request = chain.request().clone().with_header(self.header, "1")?;
        let response = chain.proceed(request).await?;
        self.order.lock().unwrap().push(self.header);
        Ok(response)
    }
}

#[tokio::test]
async fn test_interceptors_nest_like_an_onion() {
    let transport = Scripted::always(200, "{}");
    let order = Arc::new(Mutex::new(Vec::new()));
    let client = client(&transport)
        .interceptor(Tagging {
            header: "X-First",
            order: Arc::clone(&order),
        })
        .interceptor(Tagging {
            header: "X-Second",
            order: Arc::clone(&order),
        })
        .build()
        .unwrap();

    client.invoke("get_user", vec![json!(1)]).unwrap().execute_async().await.unwrap();

    let seen = transport.request(0);
    assert_eq!(seen.header("x-first"), Some("1"));
    assert_eq!(seen.header("x-second"), Some("1"));
    assert_eq!(*order.lock().unwrap(), vec!["X-Second", "X-First"]);
}

#[tokio::test]
async fn test_cancel_and_clone() {
    let transport = Scripted::always(200, "{}");
    let client = client(&transport).build().unwrap();

    let call = client.invoke("get_user", vec![json!(7)]).unwrap();
    call.cancel();
    assert!(matches!(call.execute_async().await, Err(Error::CallCanceled)));
    assert_eq!(transport.calls(), 0);

    let retry = call.clone();
    assert_eq!(retry.state(), CallState::Created);
    retry.execute_async().await.unwrap();
    assert_eq!(retry.state(), CallState::Completed);
    assert!(matches!(retry.execute_async().await, Err(Error::AlreadyExecuted)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_shape() {
    let transport = Scripted::always(503, "busy");
    let client = client(&transport)
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(4)
                .retry_on_status(503)
                .backoff(BackoffStrategy::linear(
                    Duration::from_millis(1),
                    Duration::from_millis(1),
                ))
                .build(),
        )
        .build()
        .unwrap();

    let err = client
        .invoke("get_user", vec![json!(1)])
        .unwrap()
        .execute_async()
        .await
        .unwrap_err();

    match err {
        Error::RetryExhausted { status, attempts } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn test_non_retryable_error_is_returned_verbatim() {
    let transport = Scripted::new([Err(TransportError::new(
        TransportErrorKind::Connect,
        "refused",
    ))]);
    let client = client(&transport)
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(3)
                .retry_on_error(TransportErrorKind::Timeout)
                .build(),
        )
        .build()
        .unwrap();

    let err = client
        .invoke("get_user", vec![json!(1)])
        .unwrap()
        .execute_async()
        .await
        .unwrap_err();

    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Connect));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_no_cache_header_bypasses_cache() {
    let transport = Scripted::always(200, "{}");
    let endpoint = EndpointDescriptor::builder("fresh_user", Method::GET, "/users/{id}")
        .header("Cache-Control", "no-cache")
        .binding(ParameterBinding::path("id"))
        .build()
        .unwrap();
    let client = client(&transport)
        .endpoint(endpoint)
        .cache_policy(CachePolicy::default())
        .build()
        .unwrap();

    for _ in 0..2 {
        let response = client
            .invoke("fresh_user", vec![json!(1)])
            .unwrap()
            .execute_async()
            .await
            .unwrap();
        assert!(!response.from_cache);
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_zero_ttl_endpoint_is_never_stored() {
    let transport = Scripted::always(200, "{}");
    let endpoint = EndpointDescriptor::builder("volatile", Method::GET, "/clock")
        .cache_ttl(Duration::ZERO)
        .build()
        .unwrap();
    let client = client(&transport)
        .endpoint(endpoint)
        .cache_policy(CachePolicy::default())
        .build()
        .unwrap();

    for _ in 0..2 {
        client.invoke("volatile", vec![]).unwrap().execute_async().await.unwrap();
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_form_and_header_bindings() {
    let transport = Scripted::always(200, "{}");
    let login = EndpointDescriptor::builder("login", Method::POST, "/session")
        .header("X-Client", "static")
        .form_url_encoded()
        .binding(ParameterBinding::field("user"))
        .binding(ParameterBinding::field("password"))
        .binding(ParameterBinding::header("X-Client"))
        .build()
        .unwrap();
    let client = client(&transport)
        .default_header("X-Client", "default")
        .unwrap()
        .endpoint(login)
        .build()
        .unwrap();

    client
        .invoke("login", vec![json!("ada"), json!("s3cret"), json!("dynamic")])
        .unwrap()
        .execute_async()
        .await
        .unwrap();

    let seen = transport.request(0);
    assert_eq!(seen.method(), Method::POST);
    assert_eq!(seen.header("x-client"), Some("dynamic"));
    assert_eq!(seen.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(
        seen.body(),
        &RequestBody::Form(vec![
            ("user".to_string(), "ada".to_string()),
            ("password".to_string(), "s3cret".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_json_body_is_encoded_with_wire_names() {
    let transport = Scripted::always(201, "{}");
    let create = EndpointDescriptor::builder("create_user", Method::POST, "/users")
        .binding(ParameterBinding::body())
        .body_type("User")
        .build()
        .unwrap();
    let client = client(&transport)
        .endpoint(create)
        .hydrator(
            ObjectHydrator::new().register(
                TypeDescriptor::new("User")
                    .field(FieldDescriptor::scalar("display_name").renamed("displayName")),
            ),
        )
        .build()
        .unwrap();

    client
        .invoke("create_user", vec![json!({"display_name": "Ada"})])
        .unwrap()
        .execute_async()
        .await
        .unwrap();

    let RequestBody::Bytes { content_type, bytes } = transport.request(0).body().clone() else {
        panic!("expected an encoded body");
    };
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let sent: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(sent, json!({"displayName": "Ada"}));
}

#[derive(Debug, Deserialize, PartialEq)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Repo {
    name: String,
    stars: u32,
    owner: Option<Owner>,
    #[serde(default)]
    topics: Vec<String>,
}

#[tokio::test]
async fn test_hydrated_typed_response() {
    let transport = Scripted::always(
        200,
        r#"[
            {"name": "wirecall", "stargazers_count": 5, "owner": {"login": "ada"}, "private": false},
            {"name": "scratch", "owner": "not-an-object", "topics": ["misc"]}
        ]"#,
    );
    let list = EndpointDescriptor::builder("list_repos", Method::GET, "/repos")
        .response_type(ResponseTypeHint::array("Repo"))
        .build()
        .unwrap();
    let client = client(&transport)
        .endpoint(list)
        .hydrator(
            ObjectHydrator::new()
                .register(TypeDescriptor::new("Owner").field(FieldDescriptor::scalar("login")))
                .register(
                    TypeDescriptor::new("Repo")
                        .field(FieldDescriptor::scalar("name"))
                        .field(
                            FieldDescriptor::scalar("stars")
                                .renamed("stargazers_count")
                                .with_default(json!(0)),
                        )
                        .field(FieldDescriptor::object("owner", "Owner"))
                        .field(FieldDescriptor::scalar("topics")),
                ),
        )
        .build()
        .unwrap();

    let repos = client.call::<Vec<Repo>>("list_repos", vec![]).await.unwrap();

    assert_eq!(
        repos.data,
        vec![
            Repo {
                name: "wirecall".to_string(),
                stars: 5,
                owner: Some(Owner {
                    login: "ada".to_string()
                }),
                topics: vec![],
            },
            Repo {
                name: "scratch".to_string(),
                stars: 0,
                owner: None,
                topics: vec!["misc".to_string()],
            },
        ]
    );
}

#[tokio::test]
async fn test_unsuccessful_typed_call_is_http_error() {
    let transport = Scripted::always(404, r#"{"message":"Not Found"}"#);
    let client = client(&transport).build().unwrap();

    let err = client
        .call::<Value>("get_user", vec![json!(404)])
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert_eq!(err.raw_response(), Some(r#"{"message":"Not Found"}"#));
}
