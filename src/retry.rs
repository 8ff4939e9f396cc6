//! Retry with jittered backoff.
//!
//! Single retry utility shared by both download strategies so backoff
//! behavior stays consistent instead of being re-implemented per call site.

use crate::error::Result;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::warn;

/// How delays grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles after each failed attempt (1s, 2s, 4s...).
    Exponential,
}

/// Retry policy: attempt budget plus base delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    pub fn fixed(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Delay before retrying after the given 1-based failed attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let shift = (attempt - 1).min(16);
                self.base_delay.saturating_mul(1u32 << shift)
            }
        }
    }
}

/// Run an async operation under a retry policy.
///
/// The closure receives the 1-based attempt number. The error from the
/// final attempt is returned once the budget is exhausted; intermediate
/// failures are logged, never surfaced.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, op_name: &str, mut f: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = jitter(policy.delay_after(attempt));
                warn!(
                    "{} attempt {}/{} failed: {} (retrying in {:?})",
                    op_name, attempt, attempts, e, delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop always returns")
}

/// Scale a delay by a factor in [0.8, 1.2) so concurrent retries don't
/// stampede the upstream in lockstep.
fn jitter(delay: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let factor = 0.8 + (nanos % 400) as f64 / 1000.0;
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpptakError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
        let result = retry(policy, "test", |attempt| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(OpptakError::DownloadFailed("transient".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let policy = RetryPolicy::fixed(2, Duration::from_millis(1));
        let result: Result<()> = retry(policy, "test", |_| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OpptakError::DownloadFailed("always".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(4, Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_secs(10);
        let jittered = jitter(base);
        assert!(jittered >= Duration::from_secs(8));
        assert!(jittered < Duration::from_secs(12));
    }
}
