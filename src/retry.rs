//! Backoff policy and retry eligibility rules.
//!
//! Retries are only ever attempted when repeating the request cannot cause
//! a duplicate side effect: idempotent methods on transient failures, and
//! `POST` requests that carry an idempotency key on server errors.

use http::{Method, StatusCode};
use rand::Rng;
use std::time::Duration;

/// Status codes that are retried for idempotent methods.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Exponential backoff with additive jitter.
///
/// The delay before retry `n` (0-indexed) is `base * 2^n` plus a uniformly
/// random jitter in `[0, max_jitter)`. The exponential part is capped at
/// `max_delay` when one is set.
///
/// # Examples
///
/// ```
/// use quire::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::default().without_jitter();
/// assert_eq!(backoff.delay(0), Duration::from_millis(200));
/// assert_eq!(backoff.delay(1), Duration::from_millis(400));
/// assert_eq!(backoff.delay(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry, doubled for each subsequent one.
    pub base: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub max_jitter: Duration,
    /// Ceiling for the exponential part; `None` leaves it unbounded.
    pub max_delay: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max_jitter: Duration::from_millis(100),
            max_delay: Some(Duration::from_secs(30)),
        }
    }
}

impl Backoff {
    /// Creates a backoff with the given base and default jitter and ceiling.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    /// Sets the jitter bound.
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(self) -> Self {
        self.with_max_jitter(Duration::ZERO)
    }

    /// Sets the ceiling for the exponential part.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Removes the ceiling. Large retry counts can then wait for minutes.
    pub fn uncapped(mut self) -> Self {
        self.max_delay = None;
        self
    }

    /// Returns the delay before retry `attempt` (0 = first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        let mut delay = self.base.saturating_mul(multiplier);
        if let Some(max_delay) = self.max_delay {
            delay = delay.min(max_delay);
        }

        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms > 0 {
            let jitter = rand::thread_rng().gen_range(0..jitter_ms);
            delay = delay.saturating_add(Duration::from_millis(jitter));
        }

        delay
    }

    /// Returns the largest delay this policy will produce, if bounded.
    pub fn ceiling(&self) -> Option<Duration> {
        self.max_delay.map(|max| max.saturating_add(self.max_jitter))
    }
}

/// Returns `true` for methods that can be repeated without extra effect.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::PUT | Method::DELETE | Method::HEAD
    )
}

/// Decides whether a non-2xx response should be retried.
///
/// Idempotent methods retry on [`RETRYABLE_STATUSES`]. A `POST` that
/// carries an idempotency key retries on any 5xx.
pub fn should_retry_status(method: &Method, status: StatusCode, has_idempotency_key: bool) -> bool {
    if is_idempotent(method) && RETRYABLE_STATUSES.contains(&status.as_u16()) {
        return true;
    }
    *method == Method::POST && has_idempotency_key && status.is_server_error()
}

/// Decides whether a transport failure (connect error, timeout) should be retried.
pub fn should_retry_transport(method: &Method) -> bool {
    is_idempotent(method)
}
