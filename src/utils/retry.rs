use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Retry Policies
// ============================================================================
//
// - Exponential backoff with a capped delay: consumer redelivery, where
//   attempts are unbounded.
// - Fixed backoff with bounded attempts: startup connections, which give up
//   with a typed `StartupError::Unavailable` instead of aborting the process.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// 1.0 gives a fixed backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::redelivery()
    }
}

impl RetryPolicy {
    /// Unbounded exponential backoff for redelivering a failed message.
    pub fn redelivery() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    /// Bounded fixed backoff for establishing connections at startup.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempt >= max)
    }
}

/// Result of a bounded retry
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Gave up after `attempts`, carrying the last error
    Failed { attempts: u32, error: E },
}

/// Execute an operation until it succeeds or the policy is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) => {
                if policy.exhausted(attempt) {
                    tracing::error!(attempt, error = %error, "Operation failed after all retries");
                    return RetryResult::Failed { attempts: attempt, error };
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );
                sleep(delay).await;
            }
        }
    }
}

// ============================================================================
// Startup connections
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{component} unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        component: String,
        attempts: u32,
        last_error: String,
    },
}

/// Connect to an external dependency with a bounded retry.
pub async fn connect_with_retry<F, Fut, T, E>(
    component: &str,
    policy: &RetryPolicy,
    connect: F,
) -> Result<T, StartupError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    tracing::info!(component, "Connecting to {}...", component);

    match retry_with_backoff(policy, connect).await {
        RetryResult::Success(value) => {
            tracing::info!(component, "✅ Connected to {}", component);
            Ok(value)
        }
        RetryResult::Failed { attempts, error } => Err(StartupError::Unavailable {
            component: component.to_string(),
            attempts,
            last_error: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_exponential_delays_are_capped() {
        let policy = RetryPolicy {
            max_attempts: None,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1_000), Duration::from_millis(500));
        assert!(!policy.exhausted(1_000));
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(3), Duration::from_millis(250));
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::fixed(3, Duration::from_millis(5));

        let result = retry_with_backoff(&policy, |_attempt| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("temporary failure")
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success("success")));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connect_returns_unavailable() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(5));

        let result: Result<(), StartupError> =
            connect_with_retry("scylla", &policy, |_| async { Err::<(), _>("connection refused") }).await;

        match result {
            Err(StartupError::Unavailable { component, attempts, last_error }) => {
                assert_eq!(component, "scylla");
                assert_eq!(attempts, 2);
                assert_eq!(last_error, "connection refused");
            }
            Ok(_) => panic!("expected startup failure"),
        }
    }
}
