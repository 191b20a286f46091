//! Exponential backoff policy for model requests.

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

/// Invalid retry policy values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff_base must be a finite number greater than 1 (got {0})")]
    InvalidBackoffBase(f64),

    #[error("initial_delay must be greater than zero")]
    ZeroInitialDelay,
}

/// How the model client retries failed requests.
///
/// A response whose status is in `retryable_status_codes` is retried after
/// `initial_delay * backoff_base^(attempt - 1)`, for at most `max_attempts`
/// attempts in total. No jitter is applied. Once attempts run out, the last
/// error is returned as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: f64,
    initial_delay: Duration,
    retryable_status_codes: BTreeSet<u16>,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_BACKOFF_BASE: f64 = 7.0;
    pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_STATUS_CODES: [u16; 4] = [429, 500, 503, 504];

    /// Builds a validated policy.
    pub fn new(
        max_attempts: u32,
        backoff_base: f64,
        initial_delay: Duration,
        retryable_status_codes: impl IntoIterator<Item = u16>,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !(backoff_base.is_finite() && backoff_base > 1.0) {
            return Err(PolicyError::InvalidBackoffBase(backoff_base));
        }
        if initial_delay.is_zero() {
            return Err(PolicyError::ZeroInitialDelay);
        }

        Ok(Self {
            max_attempts,
            backoff_base,
            initial_delay,
            retryable_status_codes: retryable_status_codes.into_iter().collect(),
        })
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn retryable_status_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_status_codes
    }

    /// Returns true if a response with this status should be retried.
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_base.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn worst_case_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            backoff_base: Self::DEFAULT_BACKOFF_BASE,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            retryable_status_codes: Self::DEFAULT_STATUS_CODES.into_iter().collect(),
        }
    }
}
