//! A single invocation of an endpoint.
//!
//! A [`Call`] binds a materialized request to the client's shared
//! configuration. Executing it runs the pipeline: request conversion, cache
//! lookup, the retry loop around the interceptor chain, response conversion,
//! and the cache write.

use crate::{
    converter::{RequestConverter, ResponseConverter},
    descriptor::EndpointDescriptor,
    interceptor::Chain,
    Cache, CachePolicy, ConcreteRequest, ConcreteResponse, Error, Interceptor, Response, Result,
    RetryPolicy, Transport, TransportError, TransportErrorKind,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Configuration shared by every call of a client.
pub(crate) struct CallConfig {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) cache: Option<Arc<dyn Cache>>,
    pub(crate) cache_policy: Option<CachePolicy>,
    pub(crate) request_converter: Arc<dyn RequestConverter>,
    pub(crate) response_converter: Arc<dyn ResponseConverter>,
}

impl std::fmt::Debug for CallConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallConfig")
            .field("interceptors", &self.interceptors.len())
            .field("retry_policy", &self.retry_policy)
            .field("cache", &self.cache.is_some())
            .field("cache_policy", &self.cache_policy)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a [`Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Not executed yet.
    Created,
    /// Canceled before it finished.
    Canceled,
    /// Running.
    Executing,
    /// Produced a response.
    Completed,
    /// Produced an error.
    Failed,
}

/// A single-use invocation handle.
///
/// A call executes at most once; [`Clone`] yields a fresh, unexecuted call
/// with the same request and configuration.
///
/// # Examples
///
/// ```no_run
/// use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
/// use wirecall::Client;
/// use http::Method;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), wirecall::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .endpoint(
///         EndpointDescriptor::builder("get_user", Method::GET, "/users/{id}")
///             .binding(ParameterBinding::path("id"))
///             .build()?,
///     )
///     .build()?;
///
/// let call = client.invoke("get_user", vec![json!(7)])?;
/// let response = call.execute_async().await?;
/// println!("{} after {} attempts", response.status, response.attempts);
///
/// // Issue the same request again.
/// let _again = call.clone().execute_async().await?;
/// # Ok(())
/// # }
/// ```
pub struct Call {
    request: ConcreteRequest,
    descriptor: Arc<EndpointDescriptor>,
    config: Arc<CallConfig>,
    state: Mutex<CallState>,
    canceled: AtomicBool,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("endpoint", &self.descriptor.name)
            .field("request", &self.request)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Clone for Call {
    fn clone(&self) -> Self {
        Self::new(
            self.request.clone(),
            Arc::clone(&self.descriptor),
            Arc::clone(&self.config),
        )
    }
}

impl Call {
    pub(crate) fn new(
        request: ConcreteRequest,
        descriptor: Arc<EndpointDescriptor>,
        config: Arc<CallConfig>,
    ) -> Self {
        Self {
            request,
            descriptor,
            config,
            state: Mutex::new(CallState::Created),
            canceled: AtomicBool::new(false),
        }
    }

    /// The request this call sends, before request conversion.
    pub fn request(&self) -> &ConcreteRequest {
        &self.request
    }

    /// The endpoint this call invokes.
    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    /// The current lifecycle state.
    pub fn state(&self) -> CallState {
        *self.lock_state()
    }

    /// Requests cancellation.
    ///
    /// Checked before the cache lookup and before every attempt; an attempt
    /// already in flight runs to completion.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        let mut state = self.lock_state();
        if *state == CallState::Created {
            *state = CallState::Canceled;
        }
    }

    /// `true` once [`Call::cancel`] was called.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Executes the call, blocking the current thread.
    ///
    /// Drives [`Call::execute_async`] on a private current-thread runtime, so
    /// it must not be called from within an async context.
    ///
    /// # Errors
    ///
    /// See [`Call::execute_async`].
    pub fn execute(&self) -> Result<Response<Value>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Other,
                    format!("Failed to start runtime: {e}"),
                )
                .with_source(e)
            })?;
        runtime.block_on(self.execute_async())
    }

    /// Executes the call.
    ///
    /// The returned data is the converted body of a successful response, or
    /// `Value::Null` for any other status.
    ///
    /// # Errors
    ///
    /// - [`Error::CallCanceled`] if the call was canceled
    /// - [`Error::AlreadyExecuted`] if the call was executed before
    /// - [`Error::RetryExhausted`] if every attempt got a retryable status
    /// - The last transport error when retries ran out after a failure
    /// - Conversion errors from the request or response converter
    pub async fn execute_async(&self) -> Result<Response<Value>> {
        {
            let mut state = self.lock_state();
            match *state {
                CallState::Canceled => return Err(Error::CallCanceled),
                CallState::Created => *state = CallState::Executing,
                _ => return Err(Error::AlreadyExecuted),
            }
        }

        let result = self.run().await;

        *self.lock_state() = match &result {
            Ok(_) => CallState::Completed,
            Err(Error::CallCanceled) => CallState::Canceled,
            Err(_) => CallState::Failed,
        };
        result
    }

    /// Executes the call and deserializes the body into `T`, blocking the
    /// current thread.
    ///
    /// # Errors
    ///
    /// See [`Call::execute_async_as`].
    pub fn execute_as<T: DeserializeOwned>(&self) -> Result<Response<T>> {
        into_typed(self.execute()?)
    }

    /// Executes the call and deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`Call::execute_async`] returns, plus
    /// [`Error::HttpError`] for a non-2xx response and
    /// [`Error::DeserializationFailed`] when the body does not fit `T`.
    pub async fn execute_async_as<T: DeserializeOwned>(&self) -> Result<Response<T>> {
        into_typed(self.execute_async().await?)
    }

    async fn run(&self) -> Result<Response<Value>> {
        let start = Instant::now();
        let config = &self.config;

        let body = config
            .request_converter
            .convert(self.request.body().clone(), &self.descriptor)?;
        let request = self.request.clone().with_body(body);

        let cache = match (&config.cache, &config.cache_policy) {
            (Some(cache), Some(policy)) if policy.is_cacheable(&request, None) => {
                Some((cache, policy, CachePolicy::generate_key(&request)))
            }
            _ => None,
        };

        self.check_canceled()?;
        if let Some((cache, _, key)) = &cache {
            if let Some(response) = cache.get(key) {
                tracing::debug!(
                    endpoint = %self.descriptor.name,
                    url = %request.url(),
                    "Cache hit"
                );
                return self.finish(response, start, 0).map(Response::cached);
            }
        }

        let (response, attempts) = self.send_with_retry(&request).await?;

        if let Some((cache, policy, key)) = &cache {
            let ttl = policy.ttl_for(&self.descriptor);
            if !ttl.is_zero() && policy.is_cacheable(&request, Some(&response)) {
                cache.set(key, response.clone(), ttl);
            }
        }

        self.finish(response, start, attempts)
    }

    async fn send_with_retry(
        &self,
        request: &ConcreteRequest,
    ) -> Result<(ConcreteResponse, usize)> {
        let config = &self.config;
        let policy = &config.retry_policy;
        let mut attempt = 0;

        loop {
            self.check_canceled()?;

            tracing::debug!(
                method = %request.method(),
                url = %request.url(),
                attempt = attempt + 1,
                "Executing request"
            );

            let outcome = Chain::run(
                &config.interceptors,
                config.transport.as_ref(),
                request.clone(),
            )
            .await;

            let (response, error) = match &outcome {
                Ok(response) => (Some(response), None),
                Err(error) => (None, Some(error)),
            };

            if policy.should_retry(request, response, error, attempt) {
                let delay = policy.delay_for(attempt, response);
                tracing::warn!(
                    method = %request.method(),
                    url = %request.url(),
                    attempt = attempt + 1,
                    status = response.map(|r| r.status.as_u16()),
                    error = error.map(tracing::field::display),
                    delay_ms = delay.as_millis(),
                    "Attempt failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let attempts = attempt + 1;
            return match outcome {
                Ok(response)
                    if policy.is_enabled()
                        && !response.is_successful()
                        && policy.is_retryable_status(response.status) =>
                {
                    tracing::warn!(
                        status = response.status.as_u16(),
                        attempts = attempts,
                        "Retries exhausted"
                    );
                    Err(Error::RetryExhausted {
                        status: response.status,
                        attempts,
                    })
                }
                Ok(response) => Ok((response, attempts)),
                Err(e) => {
                    tracing::warn!(error = %e, attempts = attempts, "Request failed");
                    Err(e)
                }
            };
        }
    }

    fn finish(
        &self,
        response: ConcreteResponse,
        start: Instant,
        attempts: usize,
    ) -> Result<Response<Value>> {
        let data = if response.is_successful() {
            self.config
                .response_converter
                .convert(&response, self.descriptor.response_type.as_ref())?
        } else {
            Value::Null
        };

        let latency = start.elapsed();
        tracing::info!(
            endpoint = %self.descriptor.name,
            status = response.status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Call completed"
        );

        let raw_body = response.text();
        Ok(Response::new(
            data,
            raw_body,
            response.status,
            response.headers,
            latency,
            attempts,
        ))
    }

    fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            tracing::debug!(endpoint = %self.descriptor.name, "Call canceled");
            return Err(Error::CallCanceled);
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn into_typed<T: DeserializeOwned>(response: Response<Value>) -> Result<Response<T>> {
    if !response.status.is_success() {
        return Err(Error::HttpError {
            status: response.status,
            raw_response: response.raw_body,
            headers: response.headers,
        });
    }

    let data = match serde_json::from_value::<T>(response.data.clone()) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(
                error = %e,
                status = response.status.as_u16(),
                raw_response = %response.raw_body,
                "Failed to deserialize response"
            );
            return Err(Error::DeserializationFailed {
                raw_response: response.raw_body,
                serde_error: e.to_string(),
                status: response.status,
            });
        }
    };
    Ok(response.map(|_| data))
}
