//! Bounded-concurrency fetching with order-preserving results.

use std::{fmt, future::Future, sync::Arc};

use hnsync_core::{Item, ItemId, User, source::ItemSource};
use tokio::sync::Semaphore;

use crate::retry::{RetryConfig, with_retry};

/// Outcome of one keyed fetch, for callers that must tell a record the
/// source does not have apart from a fetch that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
  Found(T),
  /// The source answered, with nothing.
  Absent,
  /// Every attempt failed; the key's state is unknown.
  Failed,
}

impl<T> Fetched<T> {
  pub fn found(self) -> Option<T> {
    match self {
      Fetched::Found(value) => Some(value),
      Fetched::Absent | Fetched::Failed => None,
    }
  }
}

/// Runs keyed fetches with at most `width` in flight.
#[derive(Debug, Clone, Copy)]
pub struct FetchPool {
  width: usize,
}

impl FetchPool {
  /// A width of 0 is treated as 1.
  pub fn new(width: usize) -> Self {
    Self { width: width.max(1) }
  }

  pub fn width(&self) -> usize { self.width }

  /// Fetch every key, returning results in input order.
  ///
  /// A fetch that fails (or whose task panics) is logged and yields `None`;
  /// it never fails the whole call.
  pub async fn fetch_all<K, T, E, F, Fut>(&self, keys: Vec<K>, fetch: F) -> Vec<Option<T>>
  where
    K: fmt::Debug,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
  {
    if keys.is_empty() {
      return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(self.width.min(keys.len())));
    let mut handles = Vec::with_capacity(keys.len());

    for key in keys {
      let semaphore = Arc::clone(&semaphore);
      let request = fetch(&key);
      let handle = tokio::spawn(async move {
        let Ok(_permit) = semaphore.acquire().await else {
          tracing::error!("fetch pool semaphore closed unexpectedly");
          return Ok(None);
        };
        request.await
      });
      handles.push((key, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (key, handle) in handles {
      match handle.await {
        Ok(Ok(value)) => results.push(value),
        Ok(Err(e)) => {
          tracing::warn!(?key, error = %e, "fetch failed, treating as absent");
          results.push(None);
        }
        Err(e) => {
          tracing::error!(?key, error = %e, "fetch task panicked, treating as absent");
          results.push(None);
        }
      }
    }
    results
  }

  /// Fetch items by ID, retrying transient failures.
  pub async fn fetch_items<S>(
    &self,
    source: &Arc<S>,
    retry: &RetryConfig,
    ids: Vec<ItemId>,
  ) -> Vec<Option<Item>>
  where
    S: ItemSource + 'static,
  {
    self
      .fetch_all(ids, |&id| {
        let source = Arc::clone(source);
        let retry = retry.clone();
        async move { with_retry(&retry, || source.fetch_item(id)).await }
      })
      .await
  }

  /// Like [`FetchPool::fetch_items`], but keeps absent items apart from
  /// failed fetches.
  pub async fn lookup_items<S>(
    &self,
    source: &Arc<S>,
    retry: &RetryConfig,
    ids: Vec<ItemId>,
  ) -> Vec<Fetched<Item>>
  where
    S: ItemSource + 'static,
  {
    self
      .fetch_all(ids, |&id| {
        let source = Arc::clone(source);
        let retry = retry.clone();
        async move { with_retry(&retry, || source.fetch_item(id)).await.map(Some) }
      })
      .await
      .into_iter()
      .map(|result| match result {
        Some(Some(item)) => Fetched::Found(item),
        Some(None) => Fetched::Absent,
        None => Fetched::Failed,
      })
      .collect()
  }

  /// Fetch user profiles by handle, retrying transient failures.
  pub async fn fetch_users<S>(
    &self,
    source: &Arc<S>,
    retry: &RetryConfig,
    handles: Vec<String>,
  ) -> Vec<Option<User>>
  where
    S: ItemSource + 'static,
  {
    self
      .fetch_all(handles, |handle| {
        let source = Arc::clone(source);
        let retry = retry.clone();
        let handle = handle.clone();
        async move { with_retry(&retry, || source.fetch_user(&handle)).await }
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;
  use crate::testing::{FakeError, FakeSource};

  #[tokio::test]
  async fn results_keep_input_order() {
    let pool = FetchPool::new(4);
    // Later keys finish first.
    let keys: Vec<u64> = (1..=8).collect();
    let out = pool
      .fetch_all(keys, |&k| async move {
        tokio::time::sleep(Duration::from_millis(40 - k * 4)).await;
        Ok::<_, FakeError>(Some(k * 10))
      })
      .await;
    assert_eq!(out, (1..=8).map(|k| Some(k * 10)).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn in_flight_never_exceeds_width() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let pool = FetchPool::new(3);

    let out = pool
      .fetch_all((0..20).collect::<Vec<u32>>(), |_| {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        async move {
          let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(5)).await;
          in_flight.fetch_sub(1, Ordering::SeqCst);
          Ok::<_, FakeError>(Some(()))
        }
      })
      .await;

    assert_eq!(out.len(), 20);
    assert!(peak.load(Ordering::SeqCst) <= 3, "peak {}", peak.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn failures_and_panics_become_absent() {
    let pool = FetchPool::new(2);
    let out = pool
      .fetch_all(vec![1, 2, 3], |&k| async move {
        match k {
          1 => Err(FakeError::permanent()),
          2 => panic!("boom"),
          _ => Ok(Some(k)),
        }
      })
      .await;
    assert_eq!(out, vec![None, None, Some(3)]);
  }

  #[tokio::test]
  async fn zero_width_still_makes_progress() {
    let pool = FetchPool::new(0);
    assert_eq!(pool.width(), 1);
    let out = pool.fetch_all(vec![1, 2], |&k| async move { Ok::<_, FakeError>(Some(k)) }).await;
    assert_eq!(out, vec![Some(1), Some(2)]);
  }

  #[tokio::test]
  async fn empty_input_returns_empty_output() {
    let out = FetchPool::new(4)
      .fetch_all(Vec::<u32>::new(), |&k| async move { Ok::<_, FakeError>(Some(k)) })
      .await;
    assert!(out.is_empty());
  }

  #[tokio::test]
  async fn fetch_items_maps_missing_to_none() {
    let source = Arc::new(FakeSource::with_stories(&[1, 2, 4]));
    let out = FetchPool::new(8).fetch_items(&source, &RetryConfig::none(), vec![4, 3, 2]).await;
    let ids: Vec<_> = out.iter().map(|item| item.as_ref().map(|i| i.id)).collect();
    assert_eq!(ids, vec![Some(4), None, Some(2)]);
  }

  #[tokio::test]
  async fn lookup_items_tells_absent_from_failed() {
    let source = Arc::new(FakeSource::with_stories(&[1, 4]).failing(2, 1, false));
    let out = FetchPool::new(8).lookup_items(&source, &RetryConfig::none(), vec![4, 3, 2]).await;
    let shape: Vec<_> = out
      .into_iter()
      .map(|fetched| match fetched {
        Fetched::Found(item) => Fetched::Found(item.id),
        Fetched::Absent => Fetched::Absent,
        Fetched::Failed => Fetched::Failed,
      })
      .collect();
    assert_eq!(shape, vec![Fetched::Found(4), Fetched::Absent, Fetched::Failed]);
  }
}
