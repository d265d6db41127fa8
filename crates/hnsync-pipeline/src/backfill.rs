//! Batched historical loads over ID ranges, ID lists and user handles.

use std::sync::Arc;

use hnsync_core::{IdSelection, ItemId, sink::RecordSink, source::ItemSource};
use tokio::sync::watch;

use crate::{BatchWriter, FetchPool, Fetched, Progress, Result, RetryConfig, WriteStats};

/// Summary of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
  /// Keys fetched, present or not.
  pub requested:   u64,
  /// Records the sink inserted or replaced.
  pub written:     u64,
  /// The run stopped early on a shutdown signal.
  pub interrupted: bool,
}

impl BackfillReport {
  fn record(&mut self, stats: WriteStats) {
    self.requested += stats.requested as u64;
    self.written += stats.written as u64;
  }

  /// Fold a later run over another part of the same job into this one.
  pub fn absorb(&mut self, other: BackfillReport) {
    self.requested += other.requested;
    self.written += other.written;
    self.interrupted |= other.interrupted;
  }
}

/// Walks a selection batch by batch: fetch through the pool, then one
/// transactional write per batch.
pub struct BackfillDriver<S, K> {
  source:     Arc<S>,
  writer:     BatchWriter<K>,
  pool:       FetchPool,
  batch_size: usize,
  retry:      RetryConfig,
}

impl<S, K> BackfillDriver<S, K>
where
  S: ItemSource + 'static,
  K: RecordSink,
{
  pub fn new(
    source: Arc<S>,
    writer: BatchWriter<K>,
    pool: FetchPool,
    batch_size: usize,
    retry: RetryConfig,
  ) -> Self {
    Self { source, writer, pool, batch_size: batch_size.max(1), retry }
  }

  /// Fetch and store every item in `selection`.
  ///
  /// `shutdown` is checked between batches: a batch in progress always
  /// commits before the run stops.
  pub async fn run(
    &self,
    selection: &IdSelection,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    if let IdSelection::Range { start, end } = *selection {
      IdSelection::range(start, end)?;
    }

    let progress = Progress::new("items", Some(selection.len()));
    let mut report = BackfillReport::default();
    tracing::info!(
      total = selection.len(),
      batch_size = self.batch_size,
      workers = self.pool.width(),
      policy = ?self.writer.policy(),
      "starting item backfill"
    );

    for batch in selection.batches(self.batch_size) {
      if *shutdown.borrow() {
        report.interrupted = true;
        break;
      }
      let first = batch.first().copied();
      let fetched = self.pool.fetch_items(&self.source, &self.retry, batch).await;
      let stats = self.writer.write_items(fetched, &progress).await?;
      tracing::debug!(from = first, written = stats.written, kid_edges = stats.kid_edges, "batch committed");
      report.record(stats);
    }

    tracing::info!(
      requested = report.requested,
      written = report.written,
      interrupted = report.interrupted,
      "item backfill finished"
    );
    Ok(report)
  }

  /// Fetch and store the items in `ids`, which are expected to be missing
  /// from the sink. IDs the source answers with nothing are recorded as
  /// absent; failed fetches are not, so a later gap fill retries them.
  pub async fn run_gaps(
    &self,
    ids: Vec<ItemId>,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    let progress = Progress::new("gaps", Some(ids.len() as u64));
    let mut report = BackfillReport::default();
    let mut absent_total = 0;

    for batch in ids.chunks(self.batch_size) {
      if *shutdown.borrow() {
        report.interrupted = true;
        break;
      }
      let lookups = self.pool.lookup_items(&self.source, &self.retry, batch.to_vec()).await;
      let absent: Vec<ItemId> = batch
        .iter()
        .zip(&lookups)
        .filter(|(_, fetched)| matches!(fetched, Fetched::Absent))
        .map(|(&id, _)| id)
        .collect();
      let fetched = lookups.into_iter().map(Fetched::found).collect();

      report.record(self.writer.write_items(fetched, &progress).await?);
      absent_total += absent.len();
      self.writer.record_absent(absent).await?;
    }

    tracing::info!(
      requested = report.requested,
      written = report.written,
      absent = absent_total,
      interrupted = report.interrupted,
      "gap fill pass finished"
    );
    Ok(report)
  }

  /// Fetch and store every profile in `handles`, batch by batch.
  pub async fn run_users(
    &self,
    handles: Vec<String>,
    shutdown: &watch::Receiver<bool>,
  ) -> Result<BackfillReport> {
    let progress = Progress::new("users", Some(handles.len() as u64));
    let mut report = BackfillReport::default();
    tracing::info!(total = handles.len(), "starting user backfill");

    for batch in handles.chunks(self.batch_size) {
      if *shutdown.borrow() {
        report.interrupted = true;
        break;
      }
      let fetched = self.pool.fetch_users(&self.source, &self.retry, batch.to_vec()).await;
      report.record(self.writer.write_users(fetched, &progress).await?);
    }

    tracing::info!(
      requested = report.requested,
      written = report.written,
      interrupted = report.interrupted,
      "user backfill finished"
    );
    Ok(report)
  }
}
