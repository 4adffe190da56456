//! Reusable retry policy for calls to external services.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Configured shape of the delay schedule; the delay itself comes separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Error)]
#[error("unknown backoff '{0}' (expected 'fixed' or 'exponential')")]
pub struct ParseBackoffError(String);

impl FromStr for BackoffKind {
    type Err = ParseBackoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(BackoffKind::Fixed),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(ParseBackoffError(other.to_string())),
        }
    }
}

impl BackoffKind {
    pub fn with_delay(self, delay: Duration) -> Backoff {
        match self {
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Exponential => Backoff::Exponential { base: delay },
        }
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base`, `2 * base`, `4 * base`, ...
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay to wait before attempt number `attempt` (1-based, so the first retry is attempt 2).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base } => {
                let exponent = attempt.saturating_sub(2).min(16);
                base.saturating_mul(1 << exponent)
            }
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt hit a retryable error; carries the last one.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error stopped the loop immediately.
    Fatal(E),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Runs `op` until it succeeds, fails with an error `is_retryable` rejects,
    /// or `max_attempts` is reached. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(RetryError::Fatal(e)),
                Err(e) if attempt >= max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    })
                }
                Err(e) => {
                    let delay = self.backoff.delay_before(attempt + 1);
                    warn!(
                        "Attempt {}/{} failed ({}), retrying after {}ms",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Throttled,
        Broken,
    }

    impl std::fmt::Display for Outcome {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn throttled(e: &Outcome) -> bool {
        *e == Outcome::Throttled
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let b = Backoff::Fixed(Duration::from_secs(5));
        assert_eq!(b.delay_before(2), Duration::from_secs(5));
        assert_eq!(b.delay_before(3), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let b = Backoff::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(b.delay_before(2), Duration::from_secs(1));
        assert_eq!(b.delay_before(3), Duration::from_secs(2));
        assert_eq!(b.delay_before(4), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_retryable_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(5)));
        let started = tokio::time::Instant::now();

        let result = policy
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err(Outcome::Throttled)
                        } else {
                            Ok("done")
                        }
                    }
                },
                throttled,
            )
            .await;

        assert!(matches!(result, Ok("done")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(5)));

        let result: Result<(), _> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Outcome::Throttled) }
                },
                throttled,
            )
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, Outcome::Throttled);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(5)));

        let result: Result<(), _> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Outcome::Broken) }
                },
                throttled,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(Outcome::Broken))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO)).max_attempts, 1);
    }

    #[test]
    fn test_backoff_kind_from_str() {
        assert_eq!("fixed".parse::<BackoffKind>().unwrap(), BackoffKind::Fixed);
        assert_eq!(" Exponential ".parse::<BackoffKind>().unwrap(), BackoffKind::Exponential);
        assert!("linear".parse::<BackoffKind>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_policy_waits_longer_each_retry() {
        let base = Duration::from_secs(1);
        let policy = RetryPolicy::new(4, BackoffKind::Exponential.with_delay(base));
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .run(|_| async { Err(Outcome::Throttled) }, throttled)
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, .. })));
        // 1s + 2s + 4s between the four attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }
}
