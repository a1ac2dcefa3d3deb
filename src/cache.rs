//! Response caching.
//!
//! [`CachePolicy`] decides which exchanges may be cached and derives cache
//! keys; the [`Cache`] trait is the store. [`InMemoryCache`] is a concurrent
//! in-process store with lazy expiry.

use crate::{descriptor::EndpointDescriptor, ConcreteRequest, ConcreteResponse};
use dashmap::DashMap;
use http::{header::CACHE_CONTROL, HeaderMap, Method};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// A store for raw responses.
///
/// Implementations must be safe for concurrent use from many calls.
pub trait Cache: Send + Sync {
    /// Returns the live entry for `key`, if any. Expired entries are never
    /// returned.
    fn get(&self, key: &str) -> Option<ConcreteResponse>;

    /// Stores `response` under `key` for `ttl`.
    fn set(&self, key: &str, response: ConcreteResponse, ttl: Duration);

    /// Removes the entry for `key`.
    fn invalidate(&self, key: &str);

    /// Removes every entry.
    fn clear(&self);
}

/// A cached response and its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored response.
    pub response: ConcreteResponse,
    /// When the entry stops being served. `None` never expires.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    /// `true` once `now` reached the expiry instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A concurrent in-memory [`Cache`].
///
/// Expired entries are evicted when they are next read.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Option<ConcreteResponse> {
        let now = Instant::now();
        let (expired, response) = self
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.response.clone()))?;
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            tracing::debug!(key = %key, "Evicted expired cache entry");
            return None;
        }
        Some(response)
    }

    fn set(&self, key: &str, response: ConcreteResponse, ttl: Duration) {
        let entry = CacheEntry {
            response,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Decides cache eligibility and derives keys.
///
/// # Examples
///
/// ```
/// use wirecall::{CachePolicy, ConcreteRequest};
/// use http::Method;
/// use std::time::Duration;
///
/// let policy = CachePolicy::new(Duration::from_secs(60));
/// let url = "https://api.example.com/users?page=1".parse().unwrap();
/// let request = ConcreteRequest::new(Method::GET, url);
///
/// assert!(policy.is_cacheable(&request, None));
/// assert_eq!(CachePolicy::generate_key(&request), CachePolicy::generate_key(&request.clone()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long eligible responses are kept.
    pub ttl: Duration,
    /// Only cache `GET` requests.
    pub only_get_requests: bool,
    /// Only cache 2xx responses.
    pub only_success_responses: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl CachePolicy {
    /// Caches successful `GET` responses for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            only_get_requests: true,
            only_success_responses: true,
        }
    }

    /// Sets whether only `GET` requests are cached.
    #[must_use]
    pub fn only_get_requests(mut self, only_get: bool) -> Self {
        self.only_get_requests = only_get;
        self
    }

    /// Sets whether only 2xx responses are cached.
    #[must_use]
    pub fn only_success_responses(mut self, only_success: bool) -> Self {
        self.only_success_responses = only_success;
        self
    }

    /// Decides whether the exchange may be read from or written to the cache.
    ///
    /// Pass `None` for the response to check a request before it is sent.
    pub fn is_cacheable(
        &self,
        request: &ConcreteRequest,
        response: Option<&ConcreteResponse>,
    ) -> bool {
        if has_directive(request.headers(), &["no-cache", "no-store"]) {
            return false;
        }
        if response.is_some_and(|r| has_directive(&r.headers, &["no-store"])) {
            return false;
        }
        if self.only_get_requests && *request.method() != Method::GET {
            return false;
        }
        if self.only_success_responses && response.is_some_and(|r| !r.is_successful()) {
            return false;
        }
        true
    }

    /// Derives the cache key: a SHA-256 digest over the method and the full
    /// URL including its query string.
    pub fn generate_key(request: &ConcreteRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.method().as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(request.url().as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The TTL for an endpoint: its own `cache_ttl` when set, else the
    /// policy TTL.
    pub fn ttl_for(&self, descriptor: &EndpointDescriptor) -> Duration {
        descriptor.cache_ttl.unwrap_or(self.ttl)
    }
}

fn has_directive(headers: &HeaderMap, directives: &[&str]) -> bool {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.split('=').next().unwrap_or_default().trim())
        .any(|directive| directives.iter().any(|d| directive.eq_ignore_ascii_case(d)))
}
