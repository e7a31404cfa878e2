//! Retry policy for rate-limited model calls
//!
//! The classifier retries only on rate limiting, with exponential backoff:
//! delay before retry i is `base_delay * 2^(i-1)`. With the defaults that
//! is 3s before the second attempt and 6s before the third and last.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can observe the
//! exact schedule without waiting it out.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Total attempts (first call plus retries).
pub const MAX_RETRIES: u32 = 3;

/// Backoff base delay.
pub const BASE_DELAY: Duration = Duration::from_secs(3);

/// How long to wait between rate-limited attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before retry `attempt` (1-indexed: 1 = first retry).
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Async sleep seam, injected so tests never actually wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test sleeper that records requested delays and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
