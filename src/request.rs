//! The materialized request handed to interceptors and the transport.

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use url::Url;

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// The form name of the part.
    pub name: String,
    /// The content type of the part.
    pub content_type: String,
    /// The encoded part payload.
    pub bytes: Bytes,
}

/// The payload of a [`ConcreteRequest`].
///
/// `Json` holds a logical value that the request converter has not encoded
/// yet; after conversion the body is usually `Bytes`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A logical JSON value.
    Json(Value),
    /// Ordered form fields with raw (unencoded) values.
    Form(Vec<(String, String)>),
    /// Multipart parts; the transport picks the boundary.
    Multipart(Vec<Part>),
    /// An encoded payload.
    Bytes {
        /// Content type to send, if the request does not already carry one.
        content_type: Option<String>,
        /// The encoded bytes.
        bytes: Bytes,
    },
}

impl RequestBody {
    /// Returns `true` for [`RequestBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }
}

/// A request ready to be sent.
///
/// Immutable: every `with_*` method consumes the request and returns the
/// modified copy, so interceptors build on the value they were handed.
///
/// # Examples
///
/// ```
/// use wirecall::ConcreteRequest;
/// use http::Method;
///
/// let url = "https://api.example.com/users".parse().unwrap();
/// let request = ConcreteRequest::new(Method::GET, url)
///     .with_query("page", "2")
///     .with_header("X-Trace", "abc")
///     .unwrap();
///
/// assert_eq!(request.url().as_str(), "https://api.example.com/users?page=2");
/// assert_eq!(request.header("x-trace"), Some("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct ConcreteRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl ConcreteRequest {
    /// Creates a request without headers, query or body.
    ///
    /// Any query string already on `url` is moved into the query pairs.
    pub fn new(method: Method, mut url: Url) -> Self {
        let query = url
            .query()
            .map(split_query)
            .unwrap_or_default();
        url.set_query(None);
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            query,
            body: RequestBody::Empty,
        }
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full URL, including the query string.
    pub fn url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let query = self
                .query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        url
    }

    /// The URL without its query string.
    pub fn base_url(&self) -> &Url {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Percent-encoded query pairs, in order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The request body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Replaces the method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces the URL; a query string on `url` replaces the query pairs.
    #[must_use]
    pub fn with_url(self, url: Url) -> Self {
        let replacement = ConcreteRequest::new(self.method.clone(), url);
        Self {
            url: replacement.url,
            query: replacement.query,
            ..self
        }
    }

    /// Sets a header, replacing any value with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        Ok(self.with_header_value(name, value))
    }

    /// Sets an already-parsed header, replacing any value with the same name.
    #[must_use]
    pub fn with_header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Removes a header.
    #[must_use]
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Sets a query parameter, percent-encoding the key and value.
    ///
    /// An existing parameter with the same key keeps its position.
    #[must_use]
    pub fn with_query(self, key: &str, value: &str) -> Self {
        self.with_encoded_query(
            urlencoding::encode(key).into_owned(),
            urlencoding::encode(value).into_owned(),
        )
    }

    /// Sets an already percent-encoded query parameter.
    #[must_use]
    pub fn with_encoded_query(mut self, key: String, value: String) -> Self {
        upsert(&mut self.query, key, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// Parses a header pair, mapping failures to configuration errors.
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {e}")))?;
    Ok((name, value))
}

/// Inserts or replaces `key` in an ordered pair list.
pub(crate) fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => pairs.push((key, value)),
    }
}

fn split_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
