//! Example demonstrating retry policies, backoff and response caching.
//!
//! A flaky in-process transport answers `503` twice before succeeding, so the
//! example runs without network access.
//!
//! Run with: `cargo run --example retry_and_cache`

use http::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
use wirecall::{
    BackoffStrategy, CachePolicy, Client, ConcreteRequest, ConcreteResponse, Error, RetryPolicy,
    Transport, TransportError, TransportErrorKind,
};

/// Fails every request whose sequence number is not a multiple of three.
#[derive(Default)]
struct FlakyTransport {
    requests: AtomicUsize,
}

impl Transport for FlakyTransport {
    fn execute(&self, request: &ConcreteRequest) -> Result<ConcreteResponse, TransportError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  -> transport attempt #{n}: {} {}", request.method(), request.url());
        if n % 3 != 0 {
            return ConcreteResponse::with_status(503, "Service Unavailable")
                .with_header("Retry-After", "0")
                .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()));
        }
        Ok(ConcreteResponse::with_status(
            200,
            r#"{"symbol":"WIRE","price":42.5}"#,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct Quote {
    symbol: String,
    price: f64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("wirecall=info,retry_and_cache=info")
        .init();

    println!("=== Backoff Strategies ===");
    let strategies = [
        ("fixed", BackoffStrategy::fixed(Duration::from_millis(100))),
        (
            "linear",
            BackoffStrategy::linear(Duration::from_millis(100), Duration::from_millis(50))
                .with_max_delay(Duration::from_millis(250)),
        ),
        (
            "exponential",
            BackoffStrategy::exponential(Duration::from_millis(100), 2.0)
                .with_max_delay(Duration::from_secs(1)),
        ),
    ];
    for (name, strategy) in &strategies {
        let delays: Vec<_> = (0..5).map(|attempt| strategy.delay(attempt)).collect();
        println!("{name:>12}: {delays:?}");
    }
    println!();

    let client = Client::builder()
        .base_url("https://quotes.example.com/api")?
        .transport(FlakyTransport::default())
        .retry_policy(
            RetryPolicy::builder()
                .max_attempts(5)
                .retry_on_statuses([502, 503, 504])
                .retry_on_error(TransportErrorKind::Timeout)
                .retry_on_error(TransportErrorKind::Connect)
                .backoff(
                    BackoffStrategy::exponential(Duration::from_millis(50), 2.0)
                        .with_max_delay(Duration::from_millis(500))
                        .with_jitter(true),
                )
                .respect_retry_after(Duration::from_secs(2))
                .build(),
        )
        .cache_policy(CachePolicy::new(Duration::from_secs(30)))
        .endpoint(
            EndpointDescriptor::builder("quote", Method::GET, "/quotes/{symbol}")
                .binding(ParameterBinding::path("symbol"))
                .cache_ttl(Duration::from_secs(5))
                .build()?,
        )
        .build()?;

    println!("=== Retrying a Flaky Endpoint ===");
    let quote = client.call::<Quote>("quote", vec![json!("WIRE")]).await?;
    println!(
        "{} = {} after {} attempts in {:?}",
        quote.data.symbol, quote.data.price, quote.attempts, quote.latency
    );
    println!();

    println!("=== Serving From Cache ===");
    let cached = client.call::<Quote>("quote", vec![json!("WIRE")]).await?;
    println!(
        "{} = {} (from cache: {}, attempts: {})",
        cached.data.symbol, cached.data.price, cached.from_cache, cached.attempts
    );
    println!();

    println!("=== Cancelling a Call ===");
    let call = client.invoke("quote", vec![json!("OTHER")])?;
    call.cancel();
    match call.execute_async().await {
        Err(Error::CallCanceled) => println!("Call was canceled before it ran"),
        other => println!("Unexpected outcome: {other:?}"),
    }

    Ok(())
}
