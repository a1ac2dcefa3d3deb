//! Retry decisions.
//!
//! A [`RetryPolicy`] decides, after each attempt, whether the call should be
//! issued again, and how long to wait first. Outcomes are classified by set
//! membership: response statuses against `retryable_status_codes`, transport
//! failures against `retryable_error_kinds`.

use crate::{
    rate_limit::RateLimitInfo, BackoffStrategy, ConcreteRequest, ConcreteResponse, Error,
    TransportErrorKind,
};
use http::StatusCode;
use std::collections::HashSet;
use std::time::Duration;

/// Decides whether and when a failed attempt is retried.
///
/// Attempts are numbered from zero. A policy with `max_attempts` of 0 or 1
/// never retries; otherwise at most `max_attempts` attempts are made.
///
/// # Examples
///
/// ```
/// use wirecall::{BackoffStrategy, RetryPolicy, TransportErrorKind};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(3)
///     .retry_on_statuses([502, 503, 504])
///     .retry_on_error(TransportErrorKind::Timeout)
///     .backoff(BackoffStrategy::exponential(Duration::from_millis(100), 2.0).with_jitter(true))
///     .build();
///
/// assert!(policy.is_enabled());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Upper bound on the total number of attempts.
    pub max_attempts: usize,
    /// Response statuses that trigger a retry.
    pub retryable_status_codes: HashSet<u16>,
    /// Transport failure kinds that trigger a retry.
    pub retryable_error_kinds: HashSet<TransportErrorKind>,
    /// Delay between attempts.
    pub backoff: BackoffStrategy,
    /// Prefer `Retry-After` style headers over the backoff delay.
    pub respect_retry_after: bool,
    /// Cap for delays announced by the server.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            retryable_status_codes: HashSet::new(),
            retryable_error_kinds: HashSet::new(),
            backoff: BackoffStrategy::default(),
            respect_retry_after: false,
            max_wait: Duration::from_secs(300),
        }
    }

    /// Starts from a disabled policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::disabled(),
        }
    }

    /// `true` when more than one attempt is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// `true` when `status` is in the retryable set.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_status_codes.contains(&status.as_u16())
    }

    /// Decides whether attempt number `attempt` (zero-based) is followed by
    /// another one.
    ///
    /// Returns `false` once `attempt + 1 >= max_attempts`, whatever the
    /// outcome. Otherwise returns `true` for a response whose status is in the
    /// retryable set or an error whose transport kind is in the retryable set.
    pub fn should_retry(
        &self,
        _request: &ConcreteRequest,
        response: Option<&ConcreteResponse>,
        error: Option<&Error>,
        attempt: usize,
    ) -> bool {
        if attempt.saturating_add(1) >= self.max_attempts {
            return false;
        }
        if response.is_some_and(|r| self.is_retryable_status(r.status)) {
            return true;
        }
        error
            .and_then(Error::transport_kind)
            .is_some_and(|kind| self.retryable_error_kinds.contains(&kind))
    }

    /// Returns how long to wait after attempt number `attempt`.
    pub fn delay_for(&self, attempt: usize, response: Option<&ConcreteResponse>) -> Duration {
        if self.respect_retry_after {
            let hinted = response
                .and_then(|r| RateLimitInfo::from_headers(&r.headers).delay(self.max_wait));
            if let Some(delay) = hinted {
                return delay;
            }
        }
        self.backoff.delay(attempt)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Sets the maximum total number of attempts.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Retries responses with this status.
    pub fn retry_on_status(mut self, status: u16) -> Self {
        self.policy.retryable_status_codes.insert(status);
        self
    }

    /// Retries responses with any of these statuses.
    pub fn retry_on_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.policy.retryable_status_codes.extend(statuses);
        self
    }

    /// Retries transport failures of this kind.
    pub fn retry_on_error(mut self, kind: TransportErrorKind) -> Self {
        self.policy.retryable_error_kinds.insert(kind);
        self
    }

    /// Sets the backoff strategy.
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.policy.backoff = backoff;
        self
    }

    /// Prefers server-announced delays, capped at `max_wait`.
    pub fn respect_retry_after(mut self, max_wait: Duration) -> Self {
        self.policy.respect_retry_after = true;
        self.policy.max_wait = max_wait;
        self
    }

    /// Returns the policy.
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}
