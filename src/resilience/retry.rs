use crate::errors::TransportError;
use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Upper bound for any single backoff delay
    pub max_delay: Duration,
    /// Fraction of the delay added or removed at random, at most 1; 0 or NaN
    /// disables jitter
    pub jitter: f64,
    /// Honor `Retry-After` on 429 responses
    pub respect_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
            respect_retry_after: true,
        }
    }
}

/// Decides whether a failed attempt is retried and how long to wait.
///
/// `attempt` is zero-based: the first retry happens after attempt 0.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn should_retry(&self, error: &TransportError, attempt: u32, max_retries: u32) -> bool {
        if attempt >= max_retries {
            return false;
        }
        is_retryable(error)
    }

    /// `base * 2^attempt`, capped at the configured maximum.
    pub fn delay_for(&self, attempt: u32, base_delay: Duration) -> Duration {
        let exponential = 2u32
            .checked_pow(attempt)
            .and_then(|factor| base_delay.checked_mul(factor))
            .unwrap_or(self.config.max_delay);
        let capped = exponential.min(self.config.max_delay);

        // NaN and non-positive values disable jitter; the fraction tops out at 1
        let jitter = self.config.jitter;
        if jitter.is_nan() || jitter <= 0.0 {
            return capped;
        }

        let spread = capped.as_secs_f64() * jitter.min(1.0);
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((capped.as_secs_f64() + offset).max(0.0)).min(self.config.max_delay)
    }

    /// Backoff for a specific error; a 429 with `Retry-After` waits as long
    /// as the server asked, still capped.
    pub fn delay_for_error(&self, error: &TransportError, attempt: u32, base_delay: Duration) -> Duration {
        if self.config.respect_retry_after {
            if let Some(wait) = retry_after(error) {
                return wait.min(self.config.max_delay);
            }
        }
        self.delay_for(attempt, base_delay)
    }
}

/// Network failures, the client's own timeouts, 5xx and 429.
pub fn is_retryable(error: &TransportError) -> bool {
    match error {
        TransportError::Network { .. } | TransportError::Timeout { .. } => true,
        TransportError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        TransportError::CallerAborted
        | TransportError::Config { .. }
        | TransportError::RefreshFailed { .. }
        | TransportError::Serialization { .. }
        | TransportError::Stream { .. } => false,
    }
}

fn retry_after(error: &TransportError) -> Option<Duration> {
    match error {
        TransportError::HttpStatus {
            status: 429,
            headers,
            ..
        } => headers
            .get(http::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};
    use test_case::test_case;

    fn http_error(status: u16) -> TransportError {
        TransportError::HttpStatus {
            status,
            status_text: String::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    #[test_case(http_error(500), true; "500 retried")]
    #[test_case(http_error(503), true; "503 retried")]
    #[test_case(http_error(429), true; "429 retried")]
    #[test_case(http_error(404), false; "404 not retried")]
    #[test_case(http_error(401), false; "401 not retried")]
    #[test_case(http_error(400), false; "400 not retried")]
    #[test_case(TransportError::network("reset"), true; "network retried")]
    #[test_case(TransportError::Timeout { timeout_ms: 10 }, true; "timeout retried")]
    #[test_case(TransportError::CallerAborted, false; "caller abort not retried")]
    #[test_case(TransportError::config("no url"), false; "config not retried")]
    #[test_case(TransportError::RefreshFailed { message: "x".into() }, false; "refresh failure not retried")]
    fn test_retry_predicate(error: TransportError, expected: bool) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.should_retry(&error, 0, 3), expected);
    }

    #[test]
    fn test_no_retry_when_budget_spent() {
        let policy = RetryPolicy::default();
        let error = http_error(500);
        assert!(policy.should_retry(&error, 2, 3));
        assert!(!policy.should_retry(&error, 3, 3));
        assert!(!policy.should_retry(&error, 0, 0));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::default();
        let base = Duration::from_millis(1000);
        assert_eq!(policy.delay_for(0, base), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1, base), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2, base), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10, Duration::from_secs(1)), Duration::from_secs(30));
        assert_eq!(policy.delay_for(64, Duration::from_secs(1)), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter: 0.25,
            ..Default::default()
        });
        for _ in 0..100 {
            let delay = policy.delay_for(1, Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(1500));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test_case(f64::NAN; "nan")]
    #[test_case(-0.5; "negative")]
    #[test_case(f64::NEG_INFINITY; "negative infinity")]
    fn test_unusable_jitter_is_ignored(jitter: f64) {
        let policy = RetryPolicy::new(RetryConfig {
            jitter,
            ..Default::default()
        });
        assert_eq!(policy.delay_for(1, Duration::from_millis(1000)), Duration::from_millis(2000));
    }

    #[test_case(5.0; "above one")]
    #[test_case(f64::INFINITY; "infinity")]
    fn test_oversized_jitter_is_clamped(jitter: f64) {
        let policy = RetryPolicy::new(RetryConfig {
            jitter,
            ..Default::default()
        });
        for _ in 0..50 {
            assert!(policy.delay_for(1, Duration::from_millis(1000)) <= Duration::from_millis(4000));
        }
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, HeaderValue::from_static("7"));
        let error = TransportError::HttpStatus {
            status: 429,
            status_text: "Too Many Requests".to_string(),
            body: None,
            headers,
        };

        assert_eq!(policy.delay_for_error(&error, 0, Duration::from_secs(1)), Duration::from_secs(7));
        assert_eq!(
            policy.delay_for_error(&http_error(503), 1, Duration::from_secs(1)),
            Duration::from_secs(2)
        );
    }
}
