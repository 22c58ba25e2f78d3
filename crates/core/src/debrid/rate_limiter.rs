//! Token bucket guarding the debrid provider's request-rate ceiling.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Token bucket for a single upstream.
///
/// Tokens are added at a constant rate and consumed per request. The bucket
/// starts full, allowing a burst up to its capacity.
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token. On failure, returns how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    pub fn available(&mut self) -> f32 {
        self.refill();
        self.tokens
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Async wrapper that waits for a token instead of failing.
pub struct RateLimiter {
    name: String,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            name: name.into(),
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
        }
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.bucket.lock().await.try_acquire() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            debug!(upstream = %self.name, wait_ms = wait.as_millis() as u64, "Rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `limit`.
    /// Returns false without consuming a token when the wait runs out.
    pub async fn acquire_within(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.acquire()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10);
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert!((bucket.refill_rate - 10.0 / 60.0).abs() < 0.001);
    }

    #[test]
    fn test_token_bucket_zero_rpm_is_clamped() {
        let bucket = TokenBucket::new(0);
        assert_eq!(bucket.capacity, 1.0);
    }

    #[test]
    fn test_token_bucket_acquire_success() {
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_token_bucket_acquire_returns_wait_time() {
        let mut bucket = TokenBucket::new(10);

        for _ in 0..10 {
            tokio_test::assert_ok!(bucket.try_acquire());
        }

        let err = bucket.try_acquire().unwrap_err();
        // At 10 rpm, 1 token takes 6 seconds to refill
        assert!(err.as_secs() <= 6);
        assert!(err.as_millis() > 0);
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(60); // 1 token per second

        for _ in 0..60 {
            bucket.try_acquire().unwrap();
        }
        assert!(bucket.available() < 1.0);

        sleep(Duration::from_millis(100)).await;

        let available = bucket.available();
        assert!(available > 0.05);
        assert!(available < 0.3);
    }

    #[tokio::test]
    async fn test_acquire_within_gives_up_when_exhausted() {
        // 1 rpm: the next token is a minute away.
        let limiter = RateLimiter::new("test", 1);
        assert!(limiter.acquire_within(Duration::from_millis(50)).await);

        let start = Instant::now();
        assert!(!limiter.acquire_within(Duration::from_millis(50)).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_token() {
        // 600 rpm = one token per 100ms
        let limiter = RateLimiter::new("test", 600);
        for _ in 0..600 {
            limiter.acquire().await;
        }

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_secs(1));
    }
}
