use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Bounded retry with `retry-after` precedence and linear fallback.
///
/// `max_retries` counts attempts beyond the first one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub status_codes: Vec<u16>,
    pub respect_retry_after: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay_ms: u64, status_codes: &[u16]) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            status_codes: status_codes.to_vec(),
            respect_retry_after: true,
        }
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    /// Delay before the retry that follows zero-based `attempt`.
    pub fn delay_for(&self, attempt: usize, headers: Option<&HeaderMap>) -> Duration {
        if self.respect_retry_after {
            if let Some(seconds) = headers.and_then(retry_after_seconds) {
                return Duration::from_secs(seconds);
            }
        }
        Duration::from_millis(self.base_delay_ms.saturating_mul(attempt as u64 + 1))
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
}
