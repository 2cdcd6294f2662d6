//! Resilience layer for the megaverse client.
//!
//! Provides the shared rate limiter, the retry policy, and the pipeline
//! that composes them around a single outbound call.

mod rate_limit;
mod retry;

pub use rate_limit::{RateLimiter, MIN_REQUESTS_PER_SECOND};
pub use retry::{RetryConfig, RetryPolicy};

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::MegaverseResult;
use crate::types::CallOutcome;

/// Default admission rate, in requests per second.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 2.0;

/// Configuration for the resilience pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Steady admission rate shared by every call.
    pub requests_per_second: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

/// Rate limiter and retry policy composed around one outbound call.
///
/// Every attempt, retries included, acquires its own token from the shared
/// limiter before it runs.
#[derive(Clone)]
pub struct ResiliencePipeline {
    rate_limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl ResiliencePipeline {
    /// Creates a pipeline with its own rate limiter.
    pub fn new(config: ResilienceConfig) -> MegaverseResult<Self> {
        config.retry.validate()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.requests_per_second)?);
        Ok(Self::with_rate_limiter(config.retry, rate_limiter))
    }

    /// Creates a pipeline sharing an existing rate limiter.
    pub fn with_rate_limiter(retry: RetryConfig, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            rate_limiter,
            retry_policy: RetryPolicy::new(retry),
        }
    }

    /// Runs `operation` under the rate limiter and retry policy.
    ///
    /// The future returned by `operation` must not do any work before it is
    /// first polled: it is created before the token wait and polled after.
    /// A cancelled token wait aborts the call with a cancellation error
    /// instead of being retried.
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> MegaverseResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let rate_limiter = &self.rate_limiter;
        self.retry_policy
            .execute(cancel, || {
                let call = operation();
                async move {
                    if let Err(err) = rate_limiter.wait(cancel).await {
                        return CallOutcome::Permanent(err);
                    }
                    call.await
                }
            })
            .await
    }

    /// The shared rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// The retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl std::fmt::Debug for ResiliencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResiliencePipeline")
            .field("rate_limiter", &self.rate_limiter)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MegaverseError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn pipeline(rps: f64, attempts: u32) -> ResiliencePipeline {
        ResiliencePipeline::new(ResilienceConfig {
            retry: RetryConfig::new()
                .max_attempts(attempts)
                .initial_delay(Duration::from_millis(10))
                .max_delay(Duration::from_millis(50))
                .jitter(false),
            requests_per_second: rps,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_success() {
        let pipeline = pipeline(10.0, 3);
        let cancel = CancellationToken::new();

        let result = pipeline
            .execute(&cancel, || async { CallOutcome::Success("ok") })
            .await;

        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let config = ResilienceConfig {
            requests_per_second: 0.0,
            ..Default::default()
        };
        assert!(ResiliencePipeline::new(config).is_err());

        let config = ResilienceConfig {
            retry: RetryConfig::new().max_attempts(0),
            ..Default::default()
        };
        assert!(ResiliencePipeline::new(config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_acquires_a_token() {
        // One token per second: three attempts need about 2s even though
        // the backoff alone is only 30ms.
        let pipeline = pipeline(1.0, 3);
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let result: MegaverseResult<()> = pipeline
            .execute(&cancel, || {
                let attempts = &attempts;
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::Retryable(MegaverseError::from_status(429, "slow down", "/polyanets"))
                }
            })
            .await;

        assert!(matches!(result, Err(MegaverseError::RateLimited { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(1990));
        assert!(pipeline.rate_limiter().available_tokens() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_wait_is_not_retried() {
        let pipeline = pipeline(1.0, 5);
        assert!(pipeline.rate_limiter().allow());

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let polled = AtomicU32::new(0);
        let result: MegaverseResult<()> = pipeline
            .execute(&cancel, || {
                let polled = &polled;
                async move {
                    polled.fetch_add(1, Ordering::SeqCst);
                    CallOutcome::Success(())
                }
            })
            .await;

        assert!(result.unwrap_err().is_cancellation());
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_limiter_across_pipelines() {
        let limiter = Arc::new(RateLimiter::new(3.0).unwrap());
        let a = ResiliencePipeline::with_rate_limiter(RetryConfig::no_retries(), Arc::clone(&limiter));
        let b = ResiliencePipeline::with_rate_limiter(RetryConfig::no_retries(), Arc::clone(&limiter));
        let cancel = CancellationToken::new();

        a.execute(&cancel, || async { CallOutcome::Success(()) })
            .await
            .unwrap();
        b.execute(&cancel, || async { CallOutcome::Success(()) })
            .await
            .unwrap();

        assert!(limiter.available_tokens() < 2.0);
    }
}
