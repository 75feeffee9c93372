use std::time::Duration;

/// Coarse classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect or read timed out.
    Timeout,
    /// The API asked us to slow down (429, 503).
    Throttled,
    /// Connection refused/reset, DNS failure.
    Connection,
    /// Other 5xx.
    Http5xx(u16),
    /// Not worth retrying.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based. Throttling waits twice as long as other
    /// retryable failures at the same attempt.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let factor = match kind {
            ErrorKind::Other => return RetryDecision::NoRetry,
            ErrorKind::Throttled => 2u32,
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Http5xx(_) => 1,
        };
        let shift = attempt.saturating_sub(1).min(8);
        let delay = self
            .base_delay
            .saturating_mul(factor << shift)
            .min(self.max_delay);
        RetryDecision::RetryAfter(delay)
    }
}
