//! Bounded exponential retry for source fetches.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use hnsync_core::FetchError;
use serde::Deserialize;

/// How transient fetch failures are retried. `max_retries = 0` gives up on
/// the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_retries:  usize,
  pub min_delay_ms: u64,
  pub max_delay_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self { max_retries: 3, min_delay_ms: 250, max_delay_ms: 10_000 }
  }
}

impl RetryConfig {
  /// No retries at all; every failure is final.
  pub fn none() -> Self {
    Self { max_retries: 0, ..Self::default() }
  }

  pub fn into_backoff(&self) -> ExponentialBuilder {
    ExponentialBuilder::default()
      .with_min_delay(Duration::from_millis(self.min_delay_ms))
      .with_max_delay(Duration::from_millis(self.max_delay_ms))
      .with_max_times(self.max_retries)
      .with_jitter()
  }
}

/// Run `fetch`, retrying while it fails with a transient error and the retry
/// budget lasts. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, fetch: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: FetchError,
{
  fetch
    .retry(config.into_backoff())
    .notify(|err: &E, dur: Duration| {
      tracing::debug!(error = %err, retry_in_ms = dur.as_millis() as u64, "transient fetch failure");
    })
    .when(|err: &E| err.is_transient())
    .await
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::testing::FakeError;

  fn fast(max_retries: usize) -> RetryConfig {
    RetryConfig { max_retries, min_delay_ms: 1, max_delay_ms: 2 }
  }

  #[tokio::test]
  async fn transient_failures_are_retried_until_success() {
    let calls = AtomicUsize::new(0);
    let result = with_retry(&fast(3), || async {
      match calls.fetch_add(1, Ordering::SeqCst) {
        0 | 1 => Err(FakeError::transient()),
        _ => Ok(7),
      }
    })
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn permanent_failures_are_not_retried() {
    let calls = AtomicUsize::new(0);
    let result: Result<(), _> = with_retry(&fast(3), || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(FakeError::permanent())
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn retry_budget_is_bounded() {
    let calls = AtomicUsize::new(0);
    let result: Result<(), _> = with_retry(&fast(2), || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(FakeError::transient())
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn zero_retries_gives_up_immediately() {
    let calls = AtomicUsize::new(0);
    let result: Result<(), _> = with_retry(&fast(0), || async {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(FakeError::transient())
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
