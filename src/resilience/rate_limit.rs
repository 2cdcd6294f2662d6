//! Process-wide token bucket rate limiter.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{MegaverseError, MegaverseResult};

/// Token bucket state. Guarded by the limiter's mutex.
///
/// `tokens` may go negative: each waiter reserves its token up front and
/// sleeps off the deficit, so concurrent waiters are queued rather than
/// racing for the same refill.
struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        let capacity = burst_for(rate);
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token and returns how long the caller must wait for it.
    fn reserve(&mut self) -> Duration {
        self.refill(Instant::now());
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-self.tokens / self.rate).unwrap_or(MAX_WAIT)
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn release(&mut self) {
        self.tokens = (self.tokens + 1.0).min(self.capacity);
    }
}

/// Slowest admission rate accepted: one call per thousand seconds.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Longest single wait handed out by the bucket.
const MAX_WAIT: Duration = Duration::from_secs(u32::MAX as u64);

/// One second's worth of tokens, never less than one.
fn burst_for(rate: f64) -> f64 {
    rate.floor().max(1.0)
}

fn check_rate(requests_per_second: f64) -> MegaverseResult<()> {
    if !requests_per_second.is_finite() || requests_per_second < MIN_REQUESTS_PER_SECOND {
        return Err(MegaverseError::configuration(format!(
            "requests_per_second must be a finite number of at least {}, got {}",
            MIN_REQUESTS_PER_SECOND, requests_per_second
        )));
    }
    Ok(())
}

/// Rate limiter admitting calls at a steady rate, shared by every caller.
///
/// Tokens regenerate continuously at the configured rate up to a burst
/// capacity of one second's worth. All state lives behind an internal
/// lock; callers never coordinate among themselves.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Creates a limiter admitting `requests_per_second` calls per second.
    pub fn new(requests_per_second: f64) -> MegaverseResult<Self> {
        check_rate(requests_per_second)?;
        Ok(Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_second)),
        })
    }

    /// Waits until a token is available or `cancel` fires.
    ///
    /// Returns immediately when a token is already available. A cancelled
    /// wait gives its reserved token back and reports [`MegaverseError::Cancelled`].
    pub async fn wait(&self, cancel: &CancellationToken) -> MegaverseResult<()> {
        if cancel.is_cancelled() {
            return Err(MegaverseError::cancelled("rate limiter wait cancelled"));
        }

        let delay = self.bucket.lock().reserve();
        if delay.is_zero() {
            return Ok(());
        }

        tracing::debug!(wait_ms = delay.as_millis() as u64, "Waiting for rate limiter token");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.bucket.lock().release();
                Err(MegaverseError::cancelled("rate limiter wait cancelled"))
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Consumes a token if one is available right now.
    pub fn allow(&self) -> bool {
        self.bucket.lock().try_consume()
    }

    /// Changes the admission rate.
    ///
    /// Tokens accrued so far are kept (clamped to the new burst capacity);
    /// waits already reserved keep their computed delay.
    pub fn set_rate(&self, requests_per_second: f64) -> MegaverseResult<()> {
        check_rate(requests_per_second)?;
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now());
        bucket.rate = requests_per_second;
        bucket.capacity = burst_for(requests_per_second);
        bucket.tokens = bucket.tokens.min(bucket.capacity);
        tracing::info!(requests_per_second, burst = bucket.capacity, "Rate limit updated");
        Ok(())
    }

    /// Current rate in requests per second.
    pub fn rate(&self) -> f64 {
        self.bucket.lock().rate
    }

    /// Burst capacity.
    pub fn capacity(&self) -> f64 {
        self.bucket.lock().capacity
    }

    /// Tokens available now. Negative while waiters are queued.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now());
        bucket.tokens
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket = self.bucket.lock();
        f.debug_struct("RateLimiter")
            .field("rate", &bucket.rate)
            .field("capacity", &bucket.capacity)
            .field("tokens", &bucket.tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rejects_invalid_rate() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-1.0).is_err());
        assert!(RateLimiter::new(f64::NAN).is_err());
        assert!(RateLimiter::new(f64::INFINITY).is_err());
        assert!(RateLimiter::new(1e-20).is_err());
        assert!(RateLimiter::new(MIN_REQUESTS_PER_SECOND).is_ok());

        let limiter = RateLimiter::new(1.0).unwrap();
        assert!(limiter.set_rate(1e-20).is_err());
        assert_eq!(limiter.rate(), 1.0);
    }

    #[test]
    fn test_deep_deficit_saturates_wait() {
        let mut bucket = TokenBucket::new(1e-20);
        assert_eq!(bucket.reserve(), Duration::ZERO);
        assert_eq!(bucket.reserve(), MAX_WAIT);
        assert_eq!(bucket.reserve(), MAX_WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slowest_rate_waits_without_overflow() {
        let limiter = RateLimiter::new(MIN_REQUESTS_PER_SECOND).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        limiter.wait(&cancel).await.unwrap();
        limiter.wait(&cancel).await.unwrap();

        assert!(start.elapsed() + Duration::from_millis(1) >= Duration::from_secs(1000));
    }

    #[test]
    fn test_burst_is_one_second_of_tokens() {
        assert_eq!(RateLimiter::new(2.0).unwrap().capacity(), 2.0);
        assert_eq!(RateLimiter::new(10.5).unwrap().capacity(), 10.0);
        assert_eq!(RateLimiter::new(0.5).unwrap().capacity(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_consumes_and_refills() {
        let limiter = RateLimiter::new(1.0).unwrap();
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_immediate_when_token_available() {
        let limiter = RateLimiter::new(5.0).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.wait(&cancel).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_waits_respect_rate() {
        let limiter = RateLimiter::new(2.0).unwrap();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        // capacity 2, rate 2/s: 6 waits need at least (6 - 2) / 2 = 2s
        for _ in 0..6 {
            limiter.wait(&cancel).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_never_share_a_token() {
        let limiter = Arc::new(RateLimiter::new(2.0).unwrap());
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    limiter.wait(&cancel).await.unwrap();
                    start.elapsed()
                })
            })
            .collect();

        let mut released = Vec::new();
        for handle in handles {
            released.push(handle.await.unwrap());
        }
        released.sort();

        // The k-th release (k >= capacity) cannot happen before (k + 1 - capacity) / rate.
        for (k, at) in released.iter().enumerate().skip(2) {
            let earliest = Duration::from_secs_f64((k + 1 - 2) as f64 / 2.0);
            assert!(
                *at + Duration::from_millis(1) >= earliest,
                "release {} at {:?} earlier than {:?}",
                k,
                at,
                earliest
            );
        }
        assert!(released[9] + Duration::from_millis(1) >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_token() {
        let limiter = Arc::new(RateLimiter::new(1.0).unwrap());
        assert!(limiter.allow());

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = limiter.wait(&cancel).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(start.elapsed() < Duration::from_secs(1));

        let tokens = limiter.available_tokens();
        assert!(tokens >= 0.0 && tokens < 1.0, "tokens = {}", tokens);
    }

    #[tokio::test]
    async fn test_wait_on_cancelled_token_fails_fast() {
        let limiter = RateLimiter::new(1.0).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(limiter.wait(&cancel).await.unwrap_err().is_cancellation());
        assert!(limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_keeps_tokens() {
        let limiter = RateLimiter::new(5.0).unwrap();
        for _ in 0..3 {
            assert!(limiter.allow());
        }

        limiter.set_rate(10.0).unwrap();
        assert_eq!(limiter.rate(), 10.0);
        assert_eq!(limiter.capacity(), 10.0);
        assert!((limiter.available_tokens() - 2.0).abs() < 1e-9);

        limiter.set_rate(1.0).unwrap();
        assert!((limiter.available_tokens() - 1.0).abs() < 1e-9);

        assert!(limiter.set_rate(0.0).is_err());
        assert_eq!(limiter.rate(), 1.0);
    }
}
