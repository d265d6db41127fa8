//! Serialized, transactional batch writes.

use std::sync::Arc;

use hnsync_core::{
  Item, ItemId, User,
  sink::{RecordSink, WritePolicy},
};
use tokio::sync::Mutex;

use crate::{Error, Progress, Result};

/// Row counts for one written batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
  /// Keys in the batch, present or not.
  pub requested: usize,
  /// Records the sink inserted or replaced.
  pub written:   usize,
  pub kid_edges: usize,
}

impl WriteStats {
  pub fn add(&mut self, other: WriteStats) {
    self.requested += other.requested;
    self.written += other.written;
    self.kid_edges += other.kid_edges;
  }
}

/// Hands fetched batches to the sink, one transaction per batch.
///
/// Clones share the same write gate, so batches from the backfill and the
/// live tailer never interleave.
pub struct BatchWriter<K> {
  sink:   Arc<K>,
  policy: WritePolicy,
  gate:   Arc<Mutex<()>>,
}

impl<K> Clone for BatchWriter<K> {
  fn clone(&self) -> Self {
    Self {
      sink:   Arc::clone(&self.sink),
      policy: self.policy,
      gate:   Arc::clone(&self.gate),
    }
  }
}

impl<K: RecordSink> BatchWriter<K> {
  pub fn new(sink: Arc<K>, policy: WritePolicy) -> Self {
    Self { sink, policy, gate: Arc::new(Mutex::new(())) }
  }

  /// A writer with a different policy that still shares this one's gate.
  pub fn with_policy(&self, policy: WritePolicy) -> Self {
    Self { policy, ..self.clone() }
  }

  pub fn policy(&self) -> WritePolicy { self.policy }

  /// Write the present items of `batch` and advance `progress` by the full
  /// batch length.
  pub async fn write_items(
    &self,
    batch: Vec<Option<Item>>,
    progress: &Progress,
  ) -> Result<WriteStats> {
    let requested = batch.len();
    let newest = batch.iter().flatten().filter_map(Item::posted_at).max();
    let items: Vec<Item> = batch.into_iter().flatten().collect();

    let write = {
      let _gate = self.gate.lock().await;
      self.sink.write_items(items, self.policy).await.map_err(Error::sink)?
    };

    let posted = newest.map(|t| t.format("posted %Y-%m-%d %H:%M").to_string());
    progress.advance(requested as u64, posted.as_ref().map(|p| p as &dyn std::fmt::Display));

    Ok(WriteStats { requested, written: write.records, kid_edges: write.kid_edges })
  }

  /// Write the present profiles of `batch` and advance `progress` by the
  /// full batch length.
  pub async fn write_users(
    &self,
    batch: Vec<Option<User>>,
    progress: &Progress,
  ) -> Result<WriteStats> {
    let requested = batch.len();
    let users: Vec<User> = batch.into_iter().flatten().collect();

    let write = {
      let _gate = self.gate.lock().await;
      self.sink.write_users(users, self.policy).await.map_err(Error::sink)?
    };
    progress.advance(requested as u64, None);

    Ok(WriteStats { requested, written: write.records, kid_edges: 0 })
  }

  /// Record IDs the source has no item for. Returns how many were new.
  pub async fn record_absent(&self, ids: Vec<ItemId>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let _gate = self.gate.lock().await;
    self.sink.record_absent(ids).await.map_err(Error::sink)
  }
}
