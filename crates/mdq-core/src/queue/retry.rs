//! Retry and backoff policy for failed fetch attempts.

use std::time::Duration;

use crate::config::MdqConfig;
use crate::error::FetchErrorKind;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry; the job becomes terminal Failed.
    NoRetry,
    /// Requeue and retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of executions per job (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &MdqConfig) -> Self {
        match &cfg.retry {
            Some(r) => Self {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            },
            None => Self::default(),
        }
    }

    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Non-retryable kinds are
    /// never retried regardless of attempt count.
    pub fn decide(&self, attempt: u32, kind: FetchErrorKind) -> RetryDecision {
        if !kind.is_retryable() {
            return RetryDecision::NoRetry;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        // Exponential backoff: base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let raw = self.base_delay.saturating_mul(exp);
        RetryDecision::RetryAfter(raw.min(self.max_delay))
    }
}
