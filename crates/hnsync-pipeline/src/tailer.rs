//! Following the update feed.
//!
//! The tailer task owns the notice receiver and an [`UpdateBuffer`]. Until
//! it is told to go live every notice is queued; the go-live request drains
//! the queue in order and from then on notices are resolved as they arrive.

use std::sync::Arc;

use hnsync_core::{UpdateNotice, sink::RecordSink, source::ItemSource};
use tokio::{
  sync::{mpsc, oneshot, watch},
  task::JoinHandle,
};

use crate::{
  BatchWriter, Error, FetchPool, Progress, Result, RetryConfig, Staged, UpdateBuffer, WriteStats,
};

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Re-fetches everything an [`UpdateNotice`] names and writes it.
pub struct UpdateResolver<S, K> {
  source:   Arc<S>,
  writer:   BatchWriter<K>,
  retry:    RetryConfig,
  chunk:    usize,
  progress: Arc<Progress>,
}

impl<S, K> Clone for UpdateResolver<S, K> {
  fn clone(&self) -> Self {
    Self {
      source:   Arc::clone(&self.source),
      writer:   self.writer.clone(),
      retry:    self.retry.clone(),
      chunk:    self.chunk,
      progress: Arc::clone(&self.progress),
    }
  }
}

impl<S, K> UpdateResolver<S, K>
where
  S: ItemSource + 'static,
  K: RecordSink,
{
  /// `chunk` keys are fetched together, all at once; 0 is treated as 1.
  pub fn new(source: Arc<S>, writer: BatchWriter<K>, retry: RetryConfig, chunk: usize) -> Self {
    Self {
      source,
      writer,
      retry,
      chunk: chunk.max(1),
      progress: Arc::new(Progress::new("live", None)),
    }
  }

  /// Fetch and store every item and profile in `notice`. An empty notice
  /// does nothing.
  pub async fn resolve(&self, notice: UpdateNotice) -> Result<WriteStats> {
    let mut stats = WriteStats::default();
    if notice.is_empty() {
      return Ok(stats);
    }

    let pool = FetchPool::new(self.chunk);
    for ids in notice.items.chunks(self.chunk) {
      let fetched = pool.fetch_items(&self.source, &self.retry, ids.to_vec()).await;
      stats.add(self.writer.write_items(fetched, &self.progress).await?);
    }
    for handles in notice.profiles.chunks(self.chunk) {
      let fetched = pool.fetch_users(&self.source, &self.retry, handles.to_vec()).await;
      stats.add(self.writer.write_users(fetched, &self.progress).await?);
    }

    tracing::info!(
      items = notice.items.len(),
      profiles = notice.profiles.len(),
      written = stats.written,
      "updated {} items and {} profiles",
      notice.items.len(),
      notice.profiles.len(),
    );
    Ok(stats)
  }
}

// ─── Control ─────────────────────────────────────────────────────────────────

type GoLive = oneshot::Sender<usize>;

/// The orchestrator's side of a running [`LiveTailer`].
pub struct TailerControl {
  go_live: Option<oneshot::Sender<GoLive>>,
}

impl TailerControl {
  /// Ask the tailer to drain its buffer and go live; resolves with the
  /// number of drained notices once the drain is complete. Later calls
  /// return `Ok(0)`.
  pub async fn go_live(&mut self) -> Result<usize> {
    let Some(tx) = self.go_live.take() else {
      return Ok(0);
    };
    let (ack_tx, ack_rx) = oneshot::channel();
    tx.send(ack_tx).map_err(|_| Error::TailerStopped)?;
    ack_rx.await.map_err(|_| Error::TailerStopped)
  }
}

// ─── Tailer ──────────────────────────────────────────────────────────────────

/// Counts reported when the tailer task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailerReport {
  /// Notices resolved by the go-live drain.
  pub drained:  usize,
  /// Notices resolved after going live.
  pub resolved: usize,
}

pub struct LiveTailer<S, K> {
  resolver: UpdateResolver<S, K>,
  buffer:   UpdateBuffer,
  notices:  mpsc::Receiver<UpdateNotice>,
  go_live:  Option<oneshot::Receiver<GoLive>>,
  shutdown: watch::Receiver<bool>,
}

impl<S, K> LiveTailer<S, K>
where
  S: ItemSource + 'static,
  K: RecordSink + 'static,
{
  pub fn new(
    resolver: UpdateResolver<S, K>,
    notices: mpsc::Receiver<UpdateNotice>,
    shutdown: watch::Receiver<bool>,
  ) -> (Self, TailerControl) {
    let (tx, rx) = oneshot::channel();
    let tailer = Self {
      resolver,
      buffer: UpdateBuffer::new(),
      notices,
      go_live: Some(rx),
      shutdown,
    };
    (tailer, TailerControl { go_live: Some(tx) })
  }

  pub fn spawn(self) -> JoinHandle<Result<TailerReport>> { tokio::spawn(self.run()) }

  /// Run until shutdown, until the feed closes (after going live), or until
  /// a write fails.
  pub async fn run(mut self) -> Result<TailerReport> {
    let mut report = TailerReport::default();
    let mut feed_open = true;

    loop {
      // With the feed closed there is nothing left to do once the go-live
      // request has been served (or can no longer arrive).
      if !feed_open && self.go_live.is_none() {
        tracing::info!("update feed closed");
        break;
      }

      tokio::select! {
        biased;

        () = stopped(&mut self.shutdown) => break,

        ack = next_go_live(&mut self.go_live) => {
          let Some(ack) = ack else { continue };
          while let Ok(notice) = self.notices.try_recv() {
            self.buffer.stage(notice);
          }
          tracing::info!(buffered = self.buffer.len(), "draining buffered updates");
          let resolver = &self.resolver;
          report.drained = self
            .buffer
            .drain(|notice| async move { resolver.resolve(notice).await.map(|_| ()) })
            .await?;
          // The orchestrator may have given up waiting; nothing to do then.
          let _ = ack.send(report.drained);
        }

        notice = self.notices.recv(), if feed_open => match notice {
          None => feed_open = false,
          Some(notice) => match self.buffer.stage(notice) {
            Staged::Queued => {
              tracing::debug!(buffered = self.buffer.len(), "buffered update until backfill completes");
            }
            Staged::Resolve(notice) => {
              self.resolver.resolve(notice).await?;
              report.resolved += 1;
            }
          },
        },
      }
    }

    Ok(report)
  }
}

/// Resolves once shutdown is requested or its sender is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
  let _ = shutdown.wait_for(|stop| *stop).await;
}

/// The go-live request, once. `None` if the control handle was dropped;
/// pends forever after either outcome.
async fn next_go_live(rx: &mut Option<oneshot::Receiver<GoLive>>) -> Option<GoLive> {
  let Some(pending) = rx.as_mut() else {
    return std::future::pending().await;
  };
  let ack = pending.await.ok();
  *rx = None;
  ack
}
