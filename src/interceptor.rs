//! Interceptors and the chain that runs them.
//!
//! Interceptors add cross-cutting logic around every transport attempt:
//! authentication headers, logging, request rewriting, canned responses.
//! They run strictly nested: the first interceptor sees the request first and
//! the response last.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use wirecall::interceptor::{Chain, Interceptor};
//! use wirecall::{ConcreteResponse, Result};
//!
//! struct Auth(String);
//!
//! #[async_trait]
//! impl Interceptor for Auth {
//!     async fn intercept(&self, chain: Chain<'_>) -> Result<ConcreteResponse> {
//!         let request = chain
//!             .request()
//!             .clone()
//!             .with_header("Authorization", format!("Bearer {}", self.0))?;
//!         chain.proceed(request).await
//!     }
//! }
//! ```

use crate::{ConcreteRequest, ConcreteResponse, Result, Transport};
use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Instant;

/// A middleware unit around the transport call.
///
/// An interceptor may rewrite the request before calling
/// [`Chain::proceed`], transform the response afterwards, or return a
/// response without proceeding at all. Errors returned by `proceed`
/// propagate unchanged unless the interceptor substitutes a response.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Handles one attempt.
    ///
    /// # Errors
    ///
    /// Whatever the rest of the chain returned, or an error of the
    /// interceptor's own.
    async fn intercept(&self, chain: Chain<'_>) -> Result<ConcreteResponse>;
}

/// A cursor over the interceptor list.
///
/// Holds the immutable interceptor slice, the position of the next
/// interceptor to run, the terminal transport, and the request handed to
/// this position.
pub struct Chain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    index: usize,
    transport: &'a dyn Transport,
    request: ConcreteRequest,
}

impl std::fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("index", &self.index)
            .field("interceptors", &self.interceptors.len())
            .field("request", &self.request)
            .finish()
    }
}

impl<'a> Chain<'a> {
    /// Runs `request` through every interceptor and then the transport.
    pub(crate) async fn run(
        interceptors: &'a [Arc<dyn Interceptor>],
        transport: &'a dyn Transport,
        request: ConcreteRequest,
    ) -> Result<ConcreteResponse> {
        let chain = Chain {
            interceptors,
            index: 0,
            transport,
            request: request.clone(),
        };
        chain.proceed(request).await
    }

    /// The request handed to this position of the chain.
    pub fn request(&self) -> &ConcreteRequest {
        &self.request
    }

    /// Position of the next interceptor to run.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Passes `request` to the next interceptor, or to the transport when
    /// none remain.
    ///
    /// # Errors
    ///
    /// Whatever the next interceptor or the transport returned.
    pub async fn proceed(&self, request: ConcreteRequest) -> Result<ConcreteResponse> {
        match self.interceptors.get(self.index) {
            Some(interceptor) => {
                let next = Chain {
                    interceptors: self.interceptors,
                    index: self.index + 1,
                    transport: self.transport,
                    request,
                };
                interceptor.intercept(next).await
            }
            None => Ok(self.transport.execute_async(&request).await?),
        }
    }
}

/// Adds a fixed header to every request that does not already carry it.
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Creates the interceptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = crate::request::parse_header(name.as_ref(), value.as_ref())?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn intercept(&self, chain: Chain<'_>) -> Result<ConcreteResponse> {
        let request = chain.request().clone();
        let request = if request.headers().contains_key(&self.name) {
            request
        } else {
            request.with_header_value(self.name.clone(), self.value.clone())
        };
        chain.proceed(request).await
    }
}

/// Logs every attempt through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, chain: Chain<'_>) -> Result<ConcreteResponse> {
        let request = chain.request().clone();
        let method = request.method().clone();
        let url = request.url();
        tracing::debug!(method = %method, url = %url, "Sending request");

        let start = Instant::now();
        let result = chain.proceed(request).await;
        let latency_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                method = %method,
                url = %url,
                status = response.status.as_u16(),
                latency_ms = latency_ms,
                "Received response"
            ),
            Err(e) => tracing::warn!(
                method = %method,
                url = %url,
                error = %e,
                latency_ms = latency_ms,
                "Request failed"
            ),
        }
        result
    }
}
