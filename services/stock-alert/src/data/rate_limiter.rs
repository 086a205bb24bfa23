//! Fetch pacing.
//!
//! Enforces a minimum spacing between successive fetch attempts so the
//! scraped sites do not see bursts. The spacing applies whether or not the
//! previous attempt succeeded.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Minimum-spacing rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two acquisitions
    min_interval: Duration,
    /// When the last permit was handed out
    last_acquired: Mutex<Option<Instant>>,
    /// Name for logging
    name: String,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `name` - Name for logging purposes
    /// * `min_interval` - Minimum spacing between two acquisitions
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_acquired: Mutex::new(None),
            name: name.into(),
        }
    }

    /// Create a rate limiter from a spacing in milliseconds.
    pub fn from_millis(name: impl Into<String>, interval_ms: u64) -> Self {
        Self::new(name, Duration::from_millis(interval_ms))
    }

    /// Wait until the spacing since the previous acquisition has elapsed.
    ///
    /// The first call returns immediately.
    pub async fn acquire(&self) {
        let mut last = self.last_acquired.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(
                    limiter = %self.name,
                    wait_ms = wait_time.as_millis() as u64,
                    "Pacing fetch"
                );
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Shared rate limiter that can be cloned.
pub type SharedRateLimiter = Arc<RateLimiter>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_enforces_spacing() {
        let limiter = RateLimiter::from_millis("test", 50);

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::from_millis("test", 5_000);

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_shared_limiter_paces_across_holders() {
        let limiter: SharedRateLimiter = Arc::new(RateLimiter::from_millis("test", 100));
        let other = Arc::clone(&limiter);

        let start = Instant::now();
        limiter.acquire().await;
        other.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
