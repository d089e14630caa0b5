use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Bounded exponential backoff settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Add up to 25% random-ish jitter on top of each delay.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (zero-based): initial * 2^attempt, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mult = 1u128.checked_shl(attempt).unwrap_or(u128::MAX);
        let base_ms = self.initial_backoff.as_millis().saturating_mul(mult);
        let capped_ms = std::cmp::min(base_ms, self.max_backoff.as_millis()) as u64;
        if !self.jitter {
            return Duration::from_millis(capped_ms);
        }
        let jitter_cap = std::cmp::max(1, capped_ms / 4);
        Duration::from_millis(capped_ms.saturating_add(pseudo_jitter_ms(jitter_cap)))
    }
}

/// Run `f` until it succeeds, the error is not retryable, or retries run out.
pub async fn with_retry<T, E, Fut, F, R>(
    policy: &RetryPolicy,
    what: &str,
    retryable: R,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt > policy.max_retries || !retryable(&e) {
                    return Err(e);
                }
                let delay = policy.delay(attempt - 1);
                warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            jitter: false,
        }
    }

    #[test]
    fn delay_doubles_until_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            jitter: false,
        };
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(16));
        assert_eq!(policy.delay(4), Duration::from_secs(30));
        assert_eq!(policy.delay(200), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_quarter() {
        let policy = RetryPolicy {
            jitter: true,
            ..fast(1)
        };
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(400),
            max_backoff: Duration::from_millis(400),
            ..policy
        };
        let d = policy.delay(0);
        assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&fast(3), "test", |_| true, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(format!("fail {n}")) } else { Ok(n) }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(&fast(2), "test", |_| true, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(&fast(5), "test", |_| false, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("404".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), String> = with_retry(&RetryPolicy::none(), "test", |_| true, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("x".to_string())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
