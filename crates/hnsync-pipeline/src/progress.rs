//! Monotonic progress counters, reported through `tracing`.

use std::{
  fmt,
  sync::atomic::{AtomicU64, Ordering},
  time::{Duration, Instant},
};

/// Minimum spacing between two `info` progress lines.
const REPORT_EVERY: Duration = Duration::from_secs(5);

/// Counts keys processed by one stage of a run.
///
/// `advance` is callable from any task; the count only ever grows. Lines are
/// rate-limited so large backfills do not flood the log, but the final
/// advance that reaches `total` is always reported.
pub struct Progress {
  label:          &'static str,
  total:          Option<u64>,
  done:           AtomicU64,
  started:        Instant,
  last_report_ms: AtomicU64,
}

impl Progress {
  pub fn new(label: &'static str, total: Option<u64>) -> Self {
    Self {
      label,
      total,
      done: AtomicU64::new(0),
      started: Instant::now(),
      last_report_ms: AtomicU64::new(0),
    }
  }

  pub fn label(&self) -> &'static str { self.label }

  pub fn total(&self) -> Option<u64> { self.total }

  pub fn done(&self) -> u64 { self.done.load(Ordering::Relaxed) }

  /// Add `n` processed keys and return the new count. `context` is appended
  /// to the log line (e.g. the timestamp of the batch).
  pub fn advance(&self, n: u64, context: Option<&dyn fmt::Display>) -> u64 {
    let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
    let elapsed = self.started.elapsed();

    let finished = self.total.is_some_and(|total| done >= total);
    if finished || self.claim_report(elapsed) {
      let rate = done as f64 / elapsed.as_secs_f64().max(0.001);
      let context = context.map(|c| c.to_string()).unwrap_or_default();
      match self.total {
        Some(total) => tracing::info!(
          stage = self.label,
          done,
          total,
          per_sec = rate as u64,
          "{} {done}/{total} {context}",
          self.label,
        ),
        None => tracing::info!(
          stage = self.label,
          done,
          per_sec = rate as u64,
          "{} {done} {context}",
          self.label,
        ),
      }
    }
    done
  }

  /// True for at most one caller per reporting interval.
  fn claim_report(&self, elapsed: Duration) -> bool {
    let now = elapsed.as_millis() as u64;
    let last = self.last_report_ms.load(Ordering::Relaxed);
    now.saturating_sub(last) >= REPORT_EVERY.as_millis() as u64
      && self
        .last_report_ms
        .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
  }
}

impl fmt::Debug for Progress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Progress")
      .field("label", &self.label)
      .field("done", &self.done())
      .field("total", &self.total)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;

  #[test]
  fn advance_accumulates() {
    let p = Progress::new("items", Some(10));
    assert_eq!(p.advance(4, None), 4);
    assert_eq!(p.advance(6, Some(&"2006-10-09")), 10);
    assert_eq!(p.done(), 10);
  }

  #[tokio::test]
  async fn advance_is_shared_across_tasks() {
    let p = Arc::new(Progress::new("live", None));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let p = Arc::clone(&p);
        tokio::spawn(async move {
          for _ in 0..100 {
            p.advance(1, None);
          }
        })
      })
      .collect();
    for h in handles {
      h.await.unwrap();
    }
    assert_eq!(p.done(), 800);
  }
}
