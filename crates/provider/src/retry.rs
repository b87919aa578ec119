//! Retry policy for the LLM boundary.
//!
//! Classification is by error-message substring: transient network
//! failures retry with exponential backoff, permanent rejections fail
//! immediately, and unknown errors default to retryable.

use std::future::Future;
use std::time::Duration;

use gc_domain::{Error, Result};

const RETRYABLE: &[&str] = &["connection refused", "connection reset", "timeout", "temporary failure"];
const NON_RETRYABLE: &[&str] = &["invalid", "unauthorized", "forbidden"];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Whether `err` should be retried after failing attempt `attempt`
    /// (1-based).
    pub fn should_retry(&self, err: &Error, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        let message = err.to_string().to_lowercase();
        if RETRYABLE.iter().any(|s| message.contains(s)) {
            return true;
        }
        if NON_RETRYABLE.iter().any(|s| message.contains(s)) {
            return false;
        }
        // Unknown failure modes are assumed transient.
        true
    }

    /// Backoff before retry number `attempt` (1-based):
    /// `initial × multiplier^(attempt−1)`, capped at `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Run `operation` up to `max_attempts` times, sleeping between
    /// failures. Returns the first success or the last error.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.should_retry(&err, attempt) {
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn transient_messages_are_retryable() {
        let p = policy();
        assert!(p.should_retry(&Error::Http("Connection refused by peer".into()), 1));
        assert!(p.should_retry(&Error::Timeout("request timeout".into()), 1));
        assert!(p.should_retry(&Error::Http("Temporary Failure in name resolution".into()), 1));
    }

    #[test]
    fn permanent_messages_are_not_retryable() {
        let p = policy();
        assert!(!p.should_retry(&Error::Provider("401 Unauthorized".into()), 1));
        assert!(!p.should_retry(&Error::Provider("invalid request body".into()), 1));
        assert!(!p.should_retry(&Error::Provider("403 Forbidden".into()), 1));
    }

    #[test]
    fn unknown_errors_default_to_retryable() {
        let p = policy();
        assert!(p.should_retry(&Error::Other("mystery".into()), 1));
    }

    #[test]
    fn attempts_past_max_never_retry() {
        let p = policy();
        assert!(!p.should_retry(&Error::Timeout("timeout".into()), 3));
        assert!(!p.should_retry(&Error::Timeout("timeout".into()), 99));
    }

    #[test]
    fn delay_is_monotonic_and_capped() {
        let p = policy();
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = p.next_delay(attempt);
            assert!(delay >= previous, "delay must be non-decreasing");
            assert!(delay <= p.max_delay, "delay must respect the cap");
            previous = delay;
        }
        assert_eq!(p.next_delay(1), Duration::from_millis(1));
        assert_eq!(p.next_delay(2), Duration::from_millis(2));
        assert_eq!(p.next_delay(10), p.max_delay);
    }

    #[tokio::test]
    async fn execute_returns_first_success() {
        let p = policy();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32> = p
            .execute(|| {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Error::Timeout("timeout".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn execute_stops_on_permanent_error() {
        let p = policy();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<()> = p
            .execute(|| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Provider("401 unauthorized".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn execute_exhausts_attempts() {
        let p = policy();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<()> = p
            .execute(|| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Timeout("timeout".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
