//! Retry policy for transient database failures.

use std::{future::Future, time::Duration};

use crate::Result;

/// How often, and how patiently, a failed transaction is re-run.
///
/// Only [transient](crate::Error::is_transient) failures are retried; the
/// delay doubles on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Extra attempts after the first failure.
  pub retries:    u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { retries: 1, base_delay: Duration::from_millis(50) }
  }
}

impl RetryPolicy {
  /// Delay before retry number `attempt` (zero-based).
  pub fn delay(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
  }

  /// Run `op` until it succeeds, fails permanently, or the retries run out.
  pub(crate) async fn run<T, F, Fut>(&self, name: &'static str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Err(e) if e.is_transient() && attempt < self.retries => {
          let delay = self.delay(attempt);
          tracing::warn!(op = name, attempt, ?delay, error = %e, "transient database error, retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;
  use crate::Error;

  fn busy() -> Error {
    Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(5), None),
    ))
  }

  fn policy() -> RetryPolicy {
    RetryPolicy { retries: 1, base_delay: Duration::from_millis(1) }
  }

  #[test]
  fn delay_doubles() {
    let p = RetryPolicy { retries: 3, base_delay: Duration::from_millis(10) };
    assert_eq!(p.delay(0), Duration::from_millis(10));
    assert_eq!(p.delay(1), Duration::from_millis(20));
    assert_eq!(p.delay(2), Duration::from_millis(40));
  }

  #[tokio::test]
  async fn transient_error_is_retried_once() {
    let calls = AtomicU32::new(0);
    let out = policy()
      .run("test", || async {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 { Err(busy()) } else { Ok(7) }
      })
      .await
      .unwrap();
    assert_eq!(out, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn persistent_transient_error_surfaces_after_retry() {
    let calls = AtomicU32::new(0);
    let err = policy()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(busy())
      })
      .await
      .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn permanent_error_is_not_retried() {
    let calls = AtomicU32::new(0);
    let err = policy()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(Error::ContentNotFound(uuid::Uuid::nil()))
      })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ContentNotFound(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
