//! Backoff strategies: pure functions from a zero-based attempt number to the
//! delay before the next attempt.

use rand::Rng;
use std::time::Duration;

/// Ceiling for any computed delay (one day).
const MAX_BACKOFF: Duration = Duration::from_secs(86_400);

/// Computes the delay between retry attempts.
///
/// # Examples
///
/// ```
/// use wirecall::BackoffStrategy;
/// use std::time::Duration;
///
/// // 500ms, 500ms, 500ms...
/// let fixed = BackoffStrategy::fixed(Duration::from_millis(500));
/// assert_eq!(fixed.delay(7), Duration::from_millis(500));
///
/// // 1s, 2s, 3s... capped at 2.5s
/// let linear = BackoffStrategy::linear(Duration::from_secs(1), Duration::from_secs(1))
///     .with_max_delay(Duration::from_millis(2500));
/// assert_eq!(linear.delay(1), Duration::from_secs(2));
/// assert_eq!(linear.delay(5), Duration::from_millis(2500));
///
/// // 100ms, 200ms, 400ms...
/// let exponential = BackoffStrategy::exponential(Duration::from_millis(100), 2.0);
/// assert_eq!(exponential.delay(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// The same delay before every retry.
    Fixed(Duration),

    /// `initial + increment * attempt`, optionally capped.
    Linear {
        /// Delay before the first retry.
        initial: Duration,
        /// Added for every further attempt.
        increment: Duration,
        /// Upper bound on the delay.
        max_delay: Option<Duration>,
    },

    /// `base * multiplier^attempt`, optionally capped.
    ///
    /// With jitter enabled the final delay is drawn uniformly from
    /// `[0, delay]` (full jitter).
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Growth factor per attempt.
        multiplier: f64,
        /// Upper bound on the delay.
        max_delay: Option<Duration>,
        /// Whether to randomize the delay.
        jitter: bool,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Fixed(Duration::ZERO)
    }
}

impl BackoffStrategy {
    /// A constant delay.
    pub fn fixed(delay: Duration) -> Self {
        BackoffStrategy::Fixed(delay)
    }

    /// A linearly growing, uncapped delay.
    pub fn linear(initial: Duration, increment: Duration) -> Self {
        BackoffStrategy::Linear {
            initial,
            increment,
            max_delay: None,
        }
    }

    /// An exponentially growing, uncapped delay without jitter.
    pub fn exponential(base: Duration, multiplier: f64) -> Self {
        BackoffStrategy::Exponential {
            base,
            multiplier,
            max_delay: None,
            jitter: false,
        }
    }

    /// Caps the delay. Has no effect on [`BackoffStrategy::Fixed`].
    #[must_use]
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        match &mut self {
            BackoffStrategy::Fixed(_) => {}
            BackoffStrategy::Linear { max_delay, .. }
            | BackoffStrategy::Exponential { max_delay, .. } => *max_delay = Some(max),
        }
        self
    }

    /// Enables or disables full jitter. Only applies to exponential backoff.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        if let BackoffStrategy::Exponential { jitter, .. } = &mut self {
            *jitter = enabled;
        }
        self
    }

    /// Returns the delay before retry number `attempt + 1`.
    ///
    /// `attempt` is zero-based: `delay(0)` is the wait after the first
    /// failed attempt.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Linear {
                initial,
                increment,
                max_delay,
            } => {
                let steps = u32::try_from(attempt).unwrap_or(u32::MAX);
                let delay = initial.saturating_add(increment.saturating_mul(steps));
                cap(delay, *max_delay)
            }
            BackoffStrategy::Exponential {
                base,
                multiplier,
                max_delay,
                jitter,
            } => {
                let delay = cap(exponential_delay(*base, *multiplier, attempt), *max_delay);
                if *jitter {
                    full_jitter(delay)
                } else {
                    delay
                }
            }
        }
    }
}

fn cap(delay: Duration, max_delay: Option<Duration>) -> Duration {
    let delay = delay.min(MAX_BACKOFF);
    match max_delay {
        Some(max) => delay.min(max),
        None => delay,
    }
}

fn exponential_delay(base: Duration, multiplier: f64, attempt: usize) -> Duration {
    // Negative or non-finite multipliers degrade to a constant delay
    let multiplier = if multiplier.is_finite() && multiplier >= 0.0 {
        multiplier
    } else {
        1.0
    };
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = base.as_nanos() as f64 * multiplier.powi(exponent);
    let ceiling = MAX_BACKOFF.as_nanos() as f64;
    if !nanos.is_finite() || nanos >= ceiling {
        return MAX_BACKOFF;
    }
    Duration::from_nanos(nanos.round().max(0.0) as u64)
}

fn full_jitter(delay: Duration) -> Duration {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}
