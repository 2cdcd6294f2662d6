//! Retry policy implementation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::errors::{MegaverseError, MegaverseResult};
use crate::types::CallOutcome;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Delay multiplier for exponential backoff. At least 1.0.
    pub multiplier: f64,
    /// Whether to add up to 25% random jitter to each delay. Within one
    /// [`RetryPolicy::execute`] call a jittered delay never drops below the
    /// one before it.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn multiplier(mut self, mult: f64) -> Self {
        self.multiplier = mult;
        self
    }

    /// Sets whether to use jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Creates a configuration that makes a single attempt.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Checks the configuration's bounds.
    pub fn validate(&self) -> MegaverseResult<()> {
        if self.max_attempts == 0 {
            return Err(MegaverseError::configuration("max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(MegaverseError::configuration(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(MegaverseError::configuration(
                "initial retry delay must not exceed max delay",
            ));
        }
        Ok(())
    }

    /// Delay before the given 1-indexed attempt.
    ///
    /// Zero for the first attempt, then
    /// `min(initial_delay * multiplier^(attempt - 2), max_delay)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let max_secs = self.max_delay.as_secs_f64();
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let mut delay = if base.is_finite() {
            base.min(max_secs)
        } else {
            max_secs
        };

        if self.jitter {
            let jitter = rand::random::<f64>() * 0.25;
            delay = (delay * (1.0 + jitter)).min(max_secs);
        }

        Duration::from_secs_f64(delay)
    }
}

/// Retry policy with exponential backoff.
///
/// Attempts run strictly one after another; the next attempt never starts
/// before the previous one has produced its outcome.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// Exhaustion surfaces the last retryable error. Cancellation observed
    /// before an attempt or during a backoff sleep surfaces
    /// [`MegaverseError::Cancelled`].
    #[instrument(skip(self, cancel, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> MegaverseResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        let mut previous_delay = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(MegaverseError::cancelled(format!(
                    "cancelled before attempt {}",
                    attempt
                )));
            }

            let err = match operation().await {
                CallOutcome::Success(value) => return Ok(value),
                CallOutcome::Permanent(err) => return Err(err),
                CallOutcome::Retryable(err) => err,
            };

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %err, "Retry attempts exhausted");
                return Err(err);
            }

            attempt += 1;
            let delay = self.config.delay_before(attempt).max(previous_delay);
            previous_delay = delay;

            tracing::info!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after error"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MegaverseError::cancelled(format!(
                        "cancelled while backing off before attempt {}",
                        attempt
                    )));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Like [`RetryPolicy::execute`], for work returning a plain result.
    ///
    /// `is_retryable` decides which errors are worth another attempt.
    pub async fn execute_classified<F, Fut, T, P>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        is_retryable: P,
    ) -> MegaverseResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MegaverseResult<T>>,
        P: Fn(&MegaverseError) -> bool,
    {
        let is_retryable = &is_retryable;
        self.execute(cancel, || {
            let call = operation();
            async move { CallOutcome::classify_with(call.await, is_retryable) }
        })
        .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
