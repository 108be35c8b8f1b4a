//! Bounded retry for establishing external connections.
//!
//! Broker and store connections are attempted up to
//! [`RetryPolicy::max_attempts`] times. The delay between attempts starts at
//! `initial_delay` and is multiplied by `backoff_factor` after each failure,
//! capped at `max_delay`. A factor of 1 gives fixed spacing.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// Retry schedule for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failure.
    pub backoff_factor: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use kwekker_worker::domain::RetryPolicy;
    ///
    /// let policy = RetryPolicy {
    ///     max_attempts: 4,
    ///     initial_delay: Duration::from_secs(1),
    ///     backoff_factor: 2.0,
    ///     max_delay: Duration::from_secs(3),
    /// };
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(2), Duration::from_secs(2));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let scaled = self.initial_delay.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Async sleep used between attempts.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// `target` names what is being connected to in log events. Each failure is
/// logged at `warn` with the attempt number.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn RetrySleeper,
    target: &str,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                info!(target_name = target, attempt, "connection established");
                return Ok(value);
            }
            Err(error) if attempt >= attempts => {
                warn!(
                    target_name = target,
                    attempt,
                    max_attempts = attempts,
                    error = %error,
                    "connection attempt failed; giving up"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    target_name = target,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "connection attempt failed; retrying"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use rstest::{fixture, rstest};

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            match self.0.lock() {
                Ok(entries) => entries.clone(),
                Err(_) => panic!("sleeper mutex"),
            }
        }
    }

    #[async_trait]
    impl RetrySleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            match self.0.lock() {
                Ok(mut entries) => entries.push(duration),
                Err(_) => panic!("sleeper mutex"),
            }
        }
    }

    #[fixture]
    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[rstest]
    #[tokio::test]
    async fn first_success_does_not_sleep(policy: RetryPolicy) {
        let sleeper = RecordingSleeper::default();
        let result: Result<u8, RetryExhausted<String>> =
            retry_with_policy(&policy, &sleeper, "broker", || async { Ok(7) }).await;

        assert_eq!(result.expect("succeeds"), 7);
        assert!(sleeper.delays().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn succeeds_after_transient_failures(policy: RetryPolicy) {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = retry_with_policy(&policy, &sleeper, "store", || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(format!("refused #{call}"))
                } else {
                    Ok(call)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(
            sleeper.delays(),
            [Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn gives_up_after_max_attempts(policy: RetryPolicy) {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_policy(&policy, &sleeper, "broker", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("connection refused") }
        })
        .await;

        let exhausted = result.expect_err("all attempts fail");
        assert_eq!(exhausted.attempts, 5);
        assert_eq!(exhausted.last_error, "connection refused");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.delays().len(), 4);
        assert_eq!(
            exhausted.to_string(),
            "gave up after 5 attempts: connection refused"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let sleeper = RecordingSleeper::default();

        let result: Result<(), _> =
            retry_with_policy(&policy, &sleeper, "broker", || async { Err("down") }).await;

        assert_eq!(result.expect_err("fails").attempts, 1);
        assert!(sleeper.delays().is_empty());
    }

    #[rstest]
    #[case(1, Duration::from_millis(500))]
    #[case(2, Duration::from_secs(1))]
    #[case(3, Duration::from_secs(2))]
    #[case(4, Duration::from_secs(4))]
    #[case(5, Duration::from_secs(4))]
    #[case(u32::MAX, Duration::from_secs(4))]
    fn exponential_delays_are_capped(#[case] attempt: u32, #[case] expected: Duration) {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(4),
        };

        assert_eq!(policy.delay_for(attempt), expected);
    }
}
