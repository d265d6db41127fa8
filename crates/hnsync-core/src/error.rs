//! Error types for `hnsync-core`.

use thiserror::Error;

use crate::item::ItemId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid range: start {start} must be >= end {end} and end must be >= 1")]
  InvalidRange { start: ItemId, end: ItemId },

  #[error("invalid item id: {0:?}")]
  InvalidId(String),

  #[error("id list is empty")]
  EmptyList,

  #[error("unknown item type: {0:?}")]
  UnknownItemKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by source error types so the pipeline can decide whether a
/// failed fetch is worth retrying.
pub trait FetchError: std::error::Error + Send + Sync + 'static {
  /// `true` for network-level failures, timeouts and server-side errors.
  fn is_transient(&self) -> bool { false }
}
