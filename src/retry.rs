//! Retry policy with exponential backoff
//!
//! A failed download attempt restarts the task from its first page. Delays grow
//! exponentially from [`RetryConfig::initial_delay`] up to
//! [`RetryConfig::max_delay`], with optional jitter to avoid every worker
//! hammering a recovering source at once.
//!
//! # Example
//!
//! ```
//! use manga_dl::config::RetryConfig;
//! use manga_dl::retry::Backoff;
//! use std::time::Duration;
//!
//! let config = RetryConfig {
//!     initial_delay: Duration::from_millis(100),
//!     jitter: false,
//!     ..RetryConfig::default()
//! };
//! let mut backoff = Backoff::new(&config);
//! assert_eq!(backoff.next_delay(), Duration::from_millis(100));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(200));
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    /// Any failed attempt may be retried unless the task was cancelled or the
    /// queue is shutting down; the retry budget bounds the rest
    fn is_retryable(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::ShuttingDown)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Delay sequence for successive retries of one task
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Start a fresh delay sequence
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay to wait before the next retry
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        let grown = Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier);
        self.next = grown.min(self.max);

        if self.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

/// Sleep for `delay` unless `cancel_token` fires first
pub async fn sleep_or_cancel(delay: Duration, cancel_token: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel_token.cancelled() => Err(Error::Cancelled),
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
