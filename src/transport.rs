//! The network capability at the end of the interceptor chain.
//!
//! [`Transport`] is the seam between the call pipeline and actual I/O. The
//! crate ships [`ReqwestTransport`]; tests and alternative stacks plug in
//! their own implementation.

use crate::{ConcreteRequest, ConcreteResponse, RequestBody, TransportError, TransportErrorKind};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use std::time::Duration;

/// Sends a [`ConcreteRequest`] and returns the raw response.
///
/// Implement [`Transport::execute`] for blocking transports; asynchronous
/// transports should also override [`Transport::execute_async`], whose
/// default runs the blocking path inline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request, blocking the caller.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the exchange fails at the network
    /// level. Non-2xx statuses are responses, not errors.
    fn execute(&self, request: &ConcreteRequest) -> Result<ConcreteResponse, TransportError>;

    /// Sends the request without blocking the executor.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::execute`].
    async fn execute_async(
        &self,
        request: &ConcreteRequest,
    ) -> Result<ConcreteResponse, TransportError> {
        self.execute(request)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: &ConcreteRequest) -> Result<ConcreteResponse, TransportError> {
        (**self).execute(request)
    }

    async fn execute_async(
        &self,
        request: &ConcreteRequest,
    ) -> Result<ConcreteResponse, TransportError> {
        (**self).execute_async(request).await
    }
}

/// A [`Transport`] backed by `reqwest`.
///
/// Prefer the async path; [`Transport::execute`] drives the async path on a
/// private current-thread runtime and must not be called from inside a
/// Tokio runtime.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self::from_client(http_client, timeout))
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(http_client: reqwest::Client, timeout: Option<Duration>) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    async fn send(&self, request: &ConcreteRequest) -> Result<ConcreteResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method().clone(), request.url())
            .headers(request.headers().clone());

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Multipart(parts) => {
                let mut form = reqwest::multipart::Form::new();
                for part in parts {
                    let body = reqwest::multipart::Part::bytes(part.bytes.to_vec())
                        .mime_str(&part.content_type)?;
                    form = form.part(part.name.clone(), body);
                }
                builder.multipart(form)
            }
            RequestBody::Bytes {
                content_type,
                bytes,
            } => {
                if let Some(content_type) = content_type {
                    if !request.headers().contains_key(CONTENT_TYPE) {
                        builder = builder.header(CONTENT_TYPE, content_type.as_str());
                    }
                }
                builder.body(bytes.clone())
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.bytes().await?;

        Ok(ConcreteResponse::new(status, headers, raw_body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn execute(&self, request: &ConcreteRequest) -> Result<ConcreteResponse, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                TransportError::new(TransportErrorKind::Other, e.to_string()).with_source(e)
            })?;
        runtime.block_on(self.send(request))
    }

    async fn execute_async(
        &self,
        request: &ConcreteRequest,
    ) -> Result<ConcreteResponse, TransportError> {
        self.send(request).await
    }
}
