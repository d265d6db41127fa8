//! Staging area for update notices received before the backfill finishes.

use std::{collections::VecDeque, future::Future};

use hnsync_core::UpdateNotice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Buffering,
  Live,
}

/// What the caller should do with a staged notice.
#[derive(Debug, PartialEq, Eq)]
pub enum Staged {
  /// Held until [`UpdateBuffer::drain`].
  Queued,
  /// The buffer is live; resolve the notice now.
  Resolve(UpdateNotice),
}

/// FIFO of notices that flips once, and only once, from buffering to live.
#[derive(Debug)]
pub struct UpdateBuffer {
  mode:  Mode,
  queue: VecDeque<UpdateNotice>,
}

impl Default for UpdateBuffer {
  fn default() -> Self { Self::new() }
}

impl UpdateBuffer {
  pub fn new() -> Self {
    Self { mode: Mode::Buffering, queue: VecDeque::new() }
  }

  pub fn stage(&mut self, notice: UpdateNotice) -> Staged {
    match self.mode {
      Mode::Buffering => {
        self.queue.push_back(notice);
        Staged::Queued
      }
      Mode::Live => Staged::Resolve(notice),
    }
  }

  /// Resolve every queued notice in arrival order, one at a time, then go
  /// live. A notice leaves the queue only once `resolve` succeeded for it.
  /// On error the buffer stays in buffering mode with the remainder queued,
  /// so a later drain picks up where this one stopped.
  ///
  /// Returns the number resolved; a drain of an already-live buffer
  /// resolves nothing.
  pub async fn drain<F, Fut, E>(&mut self, mut resolve: F) -> Result<usize, E>
  where
    F: FnMut(UpdateNotice) -> Fut,
    Fut: Future<Output = Result<(), E>>,
  {
    if self.mode == Mode::Live {
      return Ok(0);
    }

    let mut drained = 0;
    while let Some(notice) = self.queue.front() {
      resolve(notice.clone()).await?;
      self.queue.pop_front();
      drained += 1;
    }
    self.mode = Mode::Live;
    Ok(drained)
  }

  pub fn len(&self) -> usize { self.queue.len() }

  pub fn is_empty(&self) -> bool { self.queue.is_empty() }

  pub fn is_live(&self) -> bool { self.mode == Mode::Live }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn notice(items: &[i64]) -> UpdateNotice {
    UpdateNotice { items: items.to_vec(), profiles: vec![] }
  }

  #[tokio::test]
  async fn drains_in_arrival_order() {
    let mut buf = UpdateBuffer::new();
    for n in [[3], [1], [2]] {
      assert_eq!(buf.stage(notice(&n)), Staged::Queued);
    }
    assert_eq!(buf.len(), 3);

    let mut seen = Vec::new();
    let drained = buf
      .drain(|n| {
        seen.push(n.items[0]);
        async { Ok::<_, ()>(()) }
      })
      .await
      .unwrap();

    assert_eq!(drained, 3);
    assert_eq!(seen, vec![3, 1, 2]);
    assert!(buf.is_empty());
    assert!(buf.is_live());
  }

  #[tokio::test]
  async fn second_drain_is_a_no_op() {
    let mut buf = UpdateBuffer::new();
    buf.stage(notice(&[1]));
    assert_eq!(buf.drain(|_| async { Ok::<_, ()>(()) }).await, Ok(1));

    let mut calls = 0;
    let again = buf
      .drain(|_| {
        calls += 1;
        async { Ok::<_, ()>(()) }
      })
      .await;
    assert_eq!(again, Ok(0));
    assert_eq!(calls, 0);
  }

  #[tokio::test]
  async fn live_buffer_passes_notices_through() {
    let mut buf = UpdateBuffer::new();
    buf.drain(|_| async { Ok::<_, ()>(()) }).await.unwrap();
    assert_eq!(buf.stage(notice(&[9])), Staged::Resolve(notice(&[9])));
    assert!(buf.is_empty());
  }

  #[tokio::test]
  async fn failed_resolution_keeps_the_notice() {
    let mut buf = UpdateBuffer::new();
    buf.stage(notice(&[1]));
    buf.stage(notice(&[2]));

    let result = buf
      .drain(|n| async move { if n.items[0] == 2 { Err("sink down") } else { Ok(()) } })
      .await;

    assert_eq!(result, Err("sink down"));
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.queue.front(), Some(&notice(&[2])));
    assert!(!buf.is_live());
  }

  #[tokio::test]
  async fn drain_after_failure_resumes_with_the_remainder() {
    let mut buf = UpdateBuffer::new();
    buf.stage(notice(&[1]));
    buf.stage(notice(&[2]));
    let failed = buf
      .drain(|n| async move { if n.items[0] == 2 { Err("sink down") } else { Ok(()) } })
      .await;
    assert_eq!(failed, Err("sink down"));

    // Still buffering: new arrivals queue behind the unresolved notice.
    assert_eq!(buf.stage(notice(&[3])), Staged::Queued);

    let mut seen = Vec::new();
    let drained = buf
      .drain(|n| {
        seen.push(n.items[0]);
        async { Ok::<_, &str>(()) }
      })
      .await;
    assert_eq!(drained, Ok(2));
    assert_eq!(seen, vec![2, 3]);
    assert!(buf.is_live());
    assert!(buf.is_empty());
  }
}
