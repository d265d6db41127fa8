//! Sequencing of a whole run: catch-up backfill, live tail, shutdown.

use std::sync::Arc;

use hnsync_core::{
  IdSelection, UpdateNotice,
  feed::{FeedHandle, Subscription},
  sink::{ConflictPolicy, RecordSink, WritePolicy},
  source::ItemSource,
};
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
};

use crate::{
  BackfillDriver, BackfillReport, BatchWriter, Error, FetchPool, LiveTailer, PipelineConfig,
  Result, TailerControl, TailerReport, UpdateResolver, retry::with_retry, tailer::stopped,
};

/// Batches per page of gap IDs read from the sink.
const GAP_PAGE_BATCHES: usize = 16;

/// What a [`SyncOrchestrator::run`] did before it returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
  pub backfill:    BackfillReport,
  /// Buffered notices resolved when the run went live.
  pub drained:     usize,
  /// Notices resolved after going live.
  pub resolved:    usize,
  /// The run ended on a shutdown signal rather than on its own.
  pub interrupted: bool,
}

/// Owns the source and sink for the duration of a run and closes the sink
/// when the run ends.
pub struct SyncOrchestrator<S, K> {
  source: Arc<S>,
  sink:   Arc<K>,
  config: PipelineConfig,
}

impl<S, K> SyncOrchestrator<S, K>
where
  S: ItemSource + 'static,
  K: RecordSink + 'static,
{
  pub fn new(source: Arc<S>, sink: Arc<K>, config: PipelineConfig) -> Self {
    Self { source, sink, config }
  }

  /// The policy used by catch-up and live writes.
  fn replace_policy(&self) -> WritePolicy {
    WritePolicy { conflict: ConflictPolicy::Replace, kids: self.config.kids }
  }

  fn driver(&self, writer: BatchWriter<K>) -> BackfillDriver<S, K> {
    BackfillDriver::new(
      Arc::clone(&self.source),
      writer,
      FetchPool::new(self.config.workers),
      self.config.batch_size,
      self.config.retry.clone(),
    )
  }

  // ── Sync ──────────────────────────────────────────────────────────────

  /// Catch up from just below the newest stored item to the source's
  /// newest, then follow `subscription` until shutdown or until the feed
  /// ends. Notices that arrive during the catch-up are applied after it.
  ///
  /// The sink is closed before the feed. Failing to close the sink is an
  /// error; failing to close the feed is only logged.
  pub async fn run<H: FeedHandle>(
    &self,
    subscription: Subscription<H>,
    shutdown: watch::Receiver<bool>,
  ) -> Result<SyncOutcome> {
    let Subscription { notices, handle } = subscription;

    let outcome = self.sync(notices, shutdown).await;
    if let Err(e) = &outcome {
      tracing::error!(error = %e, "sync failed");
    }

    let closed = self.close(Some(handle)).await;
    let outcome = outcome?;
    closed?;
    Ok(outcome)
  }

  async fn sync(
    &self,
    notices: mpsc::Receiver<UpdateNotice>,
    mut shutdown: watch::Receiver<bool>,
  ) -> Result<SyncOutcome> {
    let writer = BatchWriter::new(Arc::clone(&self.sink), self.replace_policy());
    let resolver = UpdateResolver::new(
      Arc::clone(&self.source),
      writer.clone(),
      self.config.retry.clone(),
      self.config.live_chunk,
    );
    let (tailer, mut control) = LiveTailer::new(resolver, notices, shutdown.clone());
    let mut task = tailer.spawn();

    let outcome = self.catch_up_and_tail(writer, &mut control, &mut task, &mut shutdown).await;
    if outcome.is_err() {
      task.abort();
    }
    outcome
  }

  async fn catch_up_and_tail(
    &self,
    writer: BatchWriter<K>,
    control: &mut TailerControl,
    task: &mut JoinHandle<Result<TailerReport>>,
    shutdown: &mut watch::Receiver<bool>,
  ) -> Result<SyncOutcome> {
    let source_max = with_retry(&self.config.retry, || self.source.max_item())
      .await
      .map_err(Error::source)?;
    let stored_max = self.sink.max_item_id().await.map_err(Error::sink)?;
    let start = (stored_max - self.config.safety_offset).max(self.config.floor_id);
    tracing::info!(source_max, stored_max, start, "catching up");

    let backfill = if source_max >= start {
      let selection = IdSelection::range(source_max, start)?;
      self.driver(writer).run(&selection, shutdown).await?
    } else {
      tracing::info!("store is ahead of the source, nothing to backfill");
      BackfillReport::default()
    };

    if backfill.interrupted || *shutdown.borrow() {
      tracing::info!("shutdown during catch-up, buffered updates are left for the next run");
      let tailer = (&mut *task).await??;
      return Ok(SyncOutcome { backfill, resolved: tailer.resolved, interrupted: true, drained: 0 });
    }

    let drained = match control.go_live().await {
      Ok(drained) => drained,
      // A failed task reports its own error; otherwise it saw shutdown.
      Err(Error::TailerStopped) => {
        let tailer = (&mut *task).await??;
        if *shutdown.borrow() {
          return Ok(SyncOutcome { backfill, resolved: tailer.resolved, interrupted: true, drained: 0 });
        }
        return Err(Error::TailerStopped);
      }
      Err(e) => return Err(e),
    };
    tracing::info!(drained, "catch-up complete, following live updates");

    let tailer = tokio::select! {
      joined = &mut *task => {
        tracing::warn!("live tailer ended on its own");
        joined??
      }
      () = stopped(shutdown) => (&mut *task).await??,
    };

    Ok(SyncOutcome {
      backfill,
      drained,
      resolved: tailer.resolved,
      interrupted: *shutdown.borrow(),
    })
  }

  // ── One-shot modes ────────────────────────────────────────────────────

  /// Fetch every item in `selection` once and close the sink.
  pub async fn backfill(
    &self,
    selection: &IdSelection,
    policy: WritePolicy,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    let writer = BatchWriter::new(Arc::clone(&self.sink), policy);
    let report = self.driver(writer).run(selection, shutdown).await;
    self.finish(report).await
  }

  /// Fetch every ID below the newest stored item that has neither a stored
  /// row nor an absence record, then close the sink.
  ///
  /// The gap list is read from the sink a page at a time, walking down from
  /// the newest stored item.
  pub async fn fill_gaps(
    &self,
    policy: WritePolicy,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    let report: Result<BackfillReport> = async {
      let upper = self.sink.max_item_id().await.map_err(Error::sink)?;
      let page_size = self.config.batch_size.max(1) * GAP_PAGE_BATCHES;
      tracing::info!(upper, page_size, "filling gaps");

      let driver = self.driver(BatchWriter::new(Arc::clone(&self.sink), policy));
      let mut report = BackfillReport::default();
      let mut cursor = upper;
      while !report.interrupted {
        let page = self.sink.missing_item_ids(cursor, page_size).await.map_err(Error::sink)?;
        let Some(&lowest) = page.last() else { break };
        report.absorb(driver.run_gaps(page, shutdown).await?);
        cursor = lowest - 1;
      }
      Ok(report)
    }
    .await;
    self.finish(report).await
  }

  /// Fetch the profile of every stored author without a user row, then
  /// close the sink.
  pub async fn fill_authors(
    &self,
    policy: WritePolicy,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    let report: Result<BackfillReport> = async {
      let handles = self.sink.missing_authors().await.map_err(Error::sink)?;
      tracing::info!(missing = handles.len(), "filling authors");
      let writer = BatchWriter::new(Arc::clone(&self.sink), policy);
      self.driver(writer).run_users(handles, shutdown).await
    }
    .await;
    self.finish(report).await
  }

  // ── Shutdown ──────────────────────────────────────────────────────────

  async fn finish(&self, report: Result<BackfillReport>) -> Result<BackfillReport> {
    if let Err(e) = &report {
      tracing::error!(error = %e, "backfill failed");
    }
    let closed = self.close(None::<NoFeed>).await;
    let report = report?;
    closed?;
    Ok(report)
  }

  /// Close the sink, then the feed if there is one.
  async fn close<H: FeedHandle>(&self, feed: Option<H>) -> Result<()> {
    tracing::info!("closing sink");
    let sink = self.sink.close().await;
    if let Err(e) = &sink {
      tracing::error!(error = %e, "failed to close sink");
    }

    if let Some(feed) = feed {
      tracing::info!("closing update feed");
      if let Err(e) = feed.close().await {
        tracing::warn!(error = %e, "failed to close update feed");
      }
    }

    sink.map_err(|e| Error::SinkClose(Box::new(e)))
  }
}

/// Stand-in feed type for runs without a subscription.
enum NoFeed {}

impl FeedHandle for NoFeed {
  type Error = std::convert::Infallible;

  async fn close(self) -> Result<(), Self::Error> { match self {} }
}
