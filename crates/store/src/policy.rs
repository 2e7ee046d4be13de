use std::time::Duration;

/// Retry, backoff and rate-limit settings for Steam Store requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per lookup.
    pub max_attempts: u32,
    /// Base of the exponential backoff: attempt `n` (0-based) waits
    /// `backoff_base * 2^n` before the next one.
    pub backoff_base: Duration,
    /// Fixed delay before every attempt, including the first.
    pub rate_limit: Duration,
    /// Timeout for a metadata request.
    pub request_timeout: Duration,
    /// Timeout for a cover download.
    pub cover_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            rate_limit: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            cover_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay after a failed attempt (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(31))
    }

    /// Returns true if another attempt follows `attempt` (0-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }
}
