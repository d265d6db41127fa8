//! Tuning knobs for a pipeline run.

use hnsync_core::{ItemId, sink::KidsPolicy};

use crate::RetryConfig;

/// Settings shared by every component of a run. The binary fills this from
/// its layered configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// IDs per backfill batch (one transaction each).
  pub batch_size:    usize,
  /// Fetches in flight during a backfill batch.
  pub workers:       usize,
  /// How far below the stored maximum a catch-up run restarts.
  pub safety_offset: ItemId,
  /// Lowest ID a catch-up run ever starts from.
  pub floor_id:      ItemId,
  /// Keys fetched together while resolving one update notice.
  pub live_chunk:    usize,
  /// Kid-edge reconciliation for replacing writes.
  pub kids:          KidsPolicy,
  pub retry:         RetryConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      batch_size:    512,
      workers:       128,
      safety_offset: 100_000,
      floor_id:      1,
      live_chunk:    128,
      kids:          KidsPolicy::Replace,
      retry:         RetryConfig::default(),
    }
  }
}
