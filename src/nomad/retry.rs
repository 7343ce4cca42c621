use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicy;
use crate::error::Result;

impl RetryPolicy {
    /// Backoff before retry number `retry` (0 for the first retry), without jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff before retry number `retry` with +/- `jitter_factor` applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay_for(retry);
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let mut rng = rand::thread_rng();
        let scale = rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(scale)
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt - 1);
                tracing::debug!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient Nomad failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(operation, attempts = attempt, error = %e, "Giving up on Nomad call");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NomadError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter_factor: 0.0,
        }
    }

    fn network_error() -> NomadError {
        NomadError::Network {
            url: "http://nomad/v1/nodes".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter_factor: 0.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.1,
        };
        for _ in 0..100 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(900), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1100), "{:?}", delay);
        }
    }

    #[tokio::test]
    async fn retries_network_errors_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "list_hosts", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(network_error())
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), "list_hosts", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(network_error())
        })
        .await;
        assert!(matches!(result, Err(NomadError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_answered_requests() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(5), "drain", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(NomadError::Server {
                url: "http://nomad/v1/node/h1/drain".to_string(),
                status: 500,
                body: "boom".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(NomadError::Server { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_retry() {
        let calls = &AtomicU32::new(0);
        let _: Result<()> = with_retry(&RetryPolicy::no_retry(), "list_jobs", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(network_error())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
