use super::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  max_attempts: u32,
  base_delay: Duration,
  retry_client_errors: bool,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_secs(1),
      retry_client_errors: true,
    }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      ..Self::default()
    }
  }

  pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
    self.base_delay = base_delay;
    self
  }

  /// When false, 4xx responses fail on the first attempt.
  pub fn with_client_errors_retried(mut self, retry: bool) -> Self {
    self.retry_client_errors = retry;
    self
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Sleep after the given failed attempt (1-based): 1s, 2s, 4s, ...
  pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
    self.base_delay.saturating_mul(factor)
  }

  fn should_retry(&self, err: &ApiError) -> bool {
    match err.status() {
      Some(status) if (400..500).contains(&status) => self.retry_client_errors,
      _ => err.is_retryable(),
    }
  }

  /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
  /// or the attempt budget is spent. The closure receives the 1-based attempt
  /// number. The error of the final attempt is returned unchanged.
  pub async fn run<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T, ApiError>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let mut attempt = 1;
    loop {
      let err = match attempt_fn(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) => err,
      };

      if !self.should_retry(&err) {
        return Err(err);
      }

      if attempt >= self.max_attempts {
        error!(attempts = attempt, error = %err, "giving up after retries");
        return Err(err);
      }

      let delay = self.backoff_delay(attempt);
      warn!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "retrying request"
      );
      tokio::time::sleep(delay).await;
      attempt += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::error::{decode_body, status_error};
  use std::sync::atomic::{AtomicU32, Ordering};
  use tokio::time::Instant;

  #[test]
  fn test_backoff_doubles() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
    assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
    assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
  }

  #[test]
  fn test_backoff_saturates() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_delay(64), Duration::from_secs(u32::MAX as u64));
  }

  #[test]
  fn test_zero_attempts_means_one() {
    assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_succeeds_after_failures() {
    for n in 1..=3u32 {
      let calls = AtomicU32::new(0);
      let policy = RetryPolicy::new(3);

      let result = policy
        .run(|attempt| {
          calls.fetch_add(1, Ordering::SeqCst);
          async move {
            if attempt < n {
              Err(status_error(503, ""))
            } else {
              Ok(attempt)
            }
          }
        })
        .await;

      assert_eq!(result.unwrap(), n);
      assert_eq!(calls.load(Ordering::SeqCst), n);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhausted_returns_last_error() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3);

    let err = policy
      .run(|attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), _>(status_error(500, &format!("failure {}", attempt))) }
      })
      .await
      .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.to_string(), "500: failure 3");
  }

  #[tokio::test(start_paused = true)]
  async fn test_sleeps_between_attempts() {
    let policy = RetryPolicy::new(3);
    let start = Instant::now();

    let _ = policy
      .run(|_| async { Err::<(), _>(status_error(500, "")) })
      .await;

    // 1s after the first failure, 2s after the second, none after the last
    assert_eq!(start.elapsed(), Duration::from_secs(3));
  }

  #[tokio::test(start_paused = true)]
  async fn test_decode_error_not_retried() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3);

    let err = policy
      .run(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { decode_body("<html>") }
      })
      .await
      .unwrap_err();

    assert!(matches!(err, ApiError::InvalidBody { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_client_errors_fail_fast_when_disabled() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3).with_client_errors_retried(false);

    let err = policy
      .run(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(status_error(404, r#"{"detail": "not found"}"#)) }
      })
      .await
      .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_server_errors_still_retried_when_client_errors_disabled() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(2).with_client_errors_retried(false);

    let _ = policy
      .run(|_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(status_error(502, "")) }
      })
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
