//! The entry point for declarative calls.
//!
//! A [`Client`] owns a set of endpoint descriptors and the configuration
//! every call shares. [`Client::invoke`] turns an endpoint name and its
//! arguments into a [`Call`]. Use [`ClientBuilder`] to configure and create
//! clients.

use crate::{
    builder::RequestBuilder,
    call::{Call, CallConfig},
    converter::{JsonConverter, RequestConverter, ResponseConverter},
    descriptor::EndpointDescriptor,
    Cache, CachePolicy, Error, InMemoryCache, Interceptor, ObjectHydrator, ReqwestTransport,
    Response, Result, RetryPolicy, Transport,
};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A client for a set of declared endpoints.
///
/// The client is designed to be reused across many calls. Cloning is cheap
/// and clones share the transport, cache and policies.
///
/// # Examples
///
/// ```no_run
/// use wirecall::descriptor::{EndpointDescriptor, ParameterBinding};
/// use wirecall::{BackoffStrategy, Client, RetryPolicy};
/// use http::Method;
/// use serde::Deserialize;
/// use serde_json::json;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Repo {
///     name: String,
/// }
///
/// # async fn example() -> Result<(), wirecall::Error> {
/// let client = Client::builder()
///     .base_url("https://api.github.com")?
///     .default_header("User-Agent", "wirecall")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(
///         RetryPolicy::builder()
///             .max_attempts(3)
///             .retry_on_statuses([502, 503, 504])
///             .backoff(BackoffStrategy::exponential(Duration::from_millis(100), 2.0))
///             .build(),
///     )
///     .endpoint(
///         EndpointDescriptor::builder("list_repos", Method::GET, "/users/{user}/repos")
///             .binding(ParameterBinding::path("user"))
///             .binding(ParameterBinding::query("sort"))
///             .build()?,
///     )
///     .build()?;
///
/// let repos = client
///     .call::<Vec<Repo>>("list_repos", vec![json!("octocat"), json!("updated")])
///     .await?;
/// println!("{} repos in {:?}", repos.data.len(), repos.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    request_builder: RequestBuilder,
    endpoints: HashMap<String, Arc<EndpointDescriptor>>,
    config: Arc<CallConfig>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.request_builder.base_url().as_str())
            .field("endpoints", &self.inner.endpoints.keys().collect::<Vec<_>>())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wirecall::Client;
    ///
    /// # fn example() -> Result<(), wirecall::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Materializes a call to the endpoint named `name`.
    ///
    /// `args` holds one value per binding, in declaration order;
    /// `Value::Null` marks an absent optional argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for an unknown endpoint, a wrong
    /// argument count or an argument its binding cannot accept.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Call> {
        let descriptor = self
            .inner
            .endpoints
            .get(name)
            .ok_or_else(|| Error::ConfigurationError(format!("Unknown endpoint `{name}`")))?;

        let request = self.inner.request_builder.build(descriptor, &args)?;

        tracing::debug!(
            endpoint = %name,
            method = %request.method(),
            url = %request.url(),
            "Built request"
        );

        Ok(Call::new(
            request,
            Arc::clone(descriptor),
            Arc::clone(&self.inner.config),
        ))
    }

    /// Invokes an endpoint and deserializes the response into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`Client::invoke`] and [`Call::execute_async_as`] return.
    pub async fn call<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Response<T>> {
        self.invoke(name, args)?.execute_async_as().await
    }

    /// Returns the descriptor registered under `name`.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointDescriptor> {
        self.inner.endpoints.get(name).map(|descriptor| &**descriptor)
    }

    /// The base URL endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        self.inner.request_builder.base_url()
    }

    /// The response cache, if caching is enabled.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.inner.config.cache.as_ref()
    }
}

/// A builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use wirecall::{CachePolicy, Client, InMemoryCache};
/// use wirecall::interceptor::HeaderInterceptor;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), wirecall::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .interceptor(HeaderInterceptor::new("Authorization", "Bearer token")?)
///     .cache(Arc::new(InMemoryCache::new()))
///     .cache_policy(CachePolicy::new(Duration::from_secs(60)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    endpoints: Vec<EndpointDescriptor>,
    transport: Option<Arc<dyn Transport>>,
    timeout: Option<Duration>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    retry_policy: RetryPolicy,
    cache: Option<Arc<dyn Cache>>,
    cache_policy: Option<CachePolicy>,
    request_converter: Option<Arc<dyn RequestConverter>>,
    response_converter: Option<Arc<dyn ResponseConverter>>,
    hydrator: Option<Arc<ObjectHydrator>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            endpoints: Vec::new(),
            transport: None,
            timeout: None,
            interceptors: Vec::new(),
            retry_policy: RetryPolicy::disabled(),
            cache: None,
            cache_policy: None,
            request_converter: None,
            response_converter: None,
            hydrator: None,
        }
    }

    /// Sets the base URL for all endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a header sent with every call, before endpoint headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = crate::request::parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Registers an endpoint.
    pub fn endpoint(mut self, descriptor: EndpointDescriptor) -> Self {
        self.endpoints.push(descriptor);
        self
    }

    /// Uses a custom transport instead of [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the per-attempt timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Appends an interceptor. The first one added sees requests first.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Sets the retry policy. By default calls are not retried.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Enables response caching with `cache`.
    ///
    /// Without an explicit [`ClientBuilder::cache_policy`] the default policy
    /// applies.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Enables response caching with `policy`.
    ///
    /// Without an explicit [`ClientBuilder::cache`] an [`InMemoryCache`] is
    /// used.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Replaces the default JSON request converter.
    pub fn request_converter(mut self, converter: impl RequestConverter + 'static) -> Self {
        self.request_converter = Some(Arc::new(converter));
        self
    }

    /// Replaces the default JSON response converter.
    pub fn response_converter(mut self, converter: impl ResponseConverter + 'static) -> Self {
        self.response_converter = Some(Arc::new(converter));
        self
    }

    /// Hydrates bodies of endpoints that declare a response or body type.
    ///
    /// Only affects the default JSON converters.
    pub fn hydrator(mut self, hydrator: ObjectHydrator) -> Self {
        self.hydrator = Some(Arc::new(hydrator));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if no base URL was set, an
    /// endpoint is invalid or declared twice, or the default transport
    /// cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let mut endpoints = HashMap::with_capacity(self.endpoints.len());
        for descriptor in self.endpoints {
            descriptor.validate()?;
            let name = descriptor.name.clone();
            if endpoints.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(Error::ConfigurationError(format!(
                    "Endpoint `{name}` is declared more than once"
                )));
            }
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout).map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {e}"))
            })?),
        };

        let json = match self.hydrator {
            Some(hydrator) => JsonConverter::new().with_hydrator(hydrator),
            None => JsonConverter::new(),
        };
        let request_converter = self
            .request_converter
            .unwrap_or_else(|| Arc::new(json.clone()));
        let response_converter = self
            .response_converter
            .unwrap_or_else(|| Arc::new(json));

        let (cache, cache_policy) = match (self.cache, self.cache_policy) {
            (None, None) => (None, None),
            (cache, policy) => (
                Some(cache.unwrap_or_else(|| Arc::new(InMemoryCache::new()))),
                Some(policy.unwrap_or_default()),
            ),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                request_builder: RequestBuilder::new(base_url, self.default_headers),
                endpoints,
                config: Arc::new(CallConfig {
                    transport,
                    interceptors: self.interceptors,
                    retry_policy: self.retry_policy,
                    cache,
                    cache_policy,
                    request_converter,
                    response_converter,
                }),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
