//! Raw and typed responses.
//!
//! [`ConcreteResponse`] is what the transport returns and what the cache
//! stores. [`Response`] wraps the converted data together with metadata about
//! the call, making it easy to access timing information, headers, and the
//! raw response body for debugging and observability.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// A response as received from the transport.
#[derive(Debug, Clone)]
pub struct ConcreteResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The reason phrase sent by the server, or the canonical one.
    pub reason: String,
    /// The response headers.
    pub headers: HeaderMap,
    /// The undecoded response body.
    pub raw_body: Bytes,
    /// The decoded body, when an interceptor or converter already produced it.
    pub body: Option<Value>,
}

impl ConcreteResponse {
    /// Creates a response with the canonical reason phrase for `status`.
    pub fn new(status: StatusCode, headers: HeaderMap, raw_body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            raw_body: raw_body.into(),
            body: None,
        }
    }

    /// Shorthand for a response with no headers.
    pub fn with_status(status: u16, raw_body: impl Into<Bytes>) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, HeaderMap::new(), raw_body)
    }

    /// Sets a header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: &str, value: &str) -> crate::Result<Self> {
        let (name, value) = crate::request::parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Attaches an already-decoded body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `true` for 2xx statuses.
    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The raw body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw_body).into_owned()
    }
}

/// A wrapper around a completed call.
///
/// This type provides both the converted response data and metadata about
/// the HTTP transaction, including latency, status code, headers, and the raw
/// response body.
///
/// # Type Parameters
///
/// * `T` - The type of the converted response data
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The converted response data.
    pub data: T,

    /// The raw response body as a string.
    ///
    /// This is useful for debugging, logging, or when you need to inspect
    /// the exact response from the server.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The total latency of the call, including all retry attempts and delays.
    pub latency: Duration,

    /// The number of transport attempts this call made.
    ///
    /// `1` for calls that succeeded on the first try, higher for calls that
    /// required retries, and `0` when the response came from the cache.
    pub attempts: usize,

    /// Whether the response was served from the cache.
    pub from_cache: bool,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
            from_cache: false,
        }
    }

    /// Marks the response as served from the cache.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use wirecall::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            from_cache: self.from_cache,
        }
    }

    /// Returns `true` if the call required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
