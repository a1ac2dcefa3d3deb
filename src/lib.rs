//! # Wirecall - declarative HTTP calls
//!
//! Wirecall turns a declarative endpoint description plus a list of
//! arguments into an HTTP request, runs it through a configurable pipeline
//! (interceptors, retry with backoff, response caching), and converts the
//! response into typed data, hydrating nested objects along the way.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
//! use wirecall::{BackoffStrategy, Client, RetryPolicy};
//! use http::Method;
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wirecall::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .retry_policy(
//!             RetryPolicy::builder()
//!                 .max_attempts(3)
//!                 .retry_on_statuses([502, 503, 504])
//!                 .backoff(
//!                     BackoffStrategy::exponential(Duration::from_millis(100), 2.0)
//!                         .with_max_delay(Duration::from_secs(10))
//!                         .with_jitter(true),
//!                 )
//!                 .build(),
//!         )
//!         .endpoint(
//!             EndpointDescriptor::builder("get_user", Method::GET, "/users/{id}")
//!                 .binding(ParameterBinding::path("id"))
//!                 .build()?,
//!         )
//!         .build()?;
//!
//!     let user = client.call::<User>("get_user", vec![json!(123)]).await?;
//!     println!("User {}: {}", user.data.id, user.data.name);
//!     println!("Request took {:?} over {} attempts", user.latency, user.attempts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Declarative endpoints** - Path, query, header, body, form and multipart bindings
//! - **Interceptors** - Nested middleware around every attempt
//! - **Retry policies** - Status and error-kind classification with pluggable backoff
//! - **Response caching** - Pluggable cache with TTLs and `Cache-Control` awareness
//! - **Object hydration** - Renamed keys, defaults and nested objects mapped from wire shape
//! - **Automatic logging** - Structured logging with `tracing`
//! - **Response metadata** - Latency, status, headers, attempt count and raw body
//!
//! ## Error Handling
//!
//! Errors keep the raw response around for debugging:
//!
//! ```no_run
//! use wirecall::{Client, Error};
//! use serde_json::json;
//!
//! # async fn example(client: Client) {
//! match client.call::<serde_json::Value>("get_user", vec![json!(1)]).await {
//!     Ok(response) => println!("Success: {:?}", response.data),
//!     Err(Error::RetryExhausted { status, attempts }) => {
//!         eprintln!("Still {status} after {attempts} attempts");
//!     }
//!     Err(Error::HttpError { status, raw_response, .. }) => {
//!         eprintln!("HTTP error {status}: {raw_response}");
//!     }
//!     Err(e) => eprintln!("Other error: {e}"),
//! }
//! # }
//! ```

pub mod backoff;
pub mod builder;
pub mod cache;
pub mod call;
mod client;
pub mod converter;
pub mod descriptor;
mod error;
pub mod hydrate;
pub mod interceptor;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use backoff::BackoffStrategy;
pub use cache::{Cache, CachePolicy, InMemoryCache};
pub use call::{Call, CallState};
pub use client::{Client, ClientBuilder};
pub use converter::{JsonConverter, RequestConverter, ResponseConverter};
pub use error::{Error, Result, TransportError, TransportErrorKind};
pub use hydrate::{Hydrate, ObjectHydrator};
pub use interceptor::{Chain, Interceptor};
pub use request::{ConcreteRequest, Part, RequestBody};
pub use response::{ConcreteResponse, Response};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport};
