//! Error types for `hnsync-pipeline`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] hnsync_core::Error),

  /// A sink write or read failed; the run is aborted.
  #[error("sink error: {0}")]
  Sink(#[source] BoxError),

  /// A source call the run cannot proceed without (e.g. `max_item`) failed.
  #[error("source error: {0}")]
  Source(#[source] BoxError),

  /// Closing the sink at shutdown failed; buffered writes may be lost.
  #[error("failed to close sink: {0}")]
  SinkClose(#[source] BoxError),

  #[error("live tailer stopped before going live")]
  TailerStopped,

  #[error("live tailer panicked: {0}")]
  TailerPanicked(#[from] tokio::task::JoinError),
}

impl Error {
  pub(crate) fn sink(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Sink(Box::new(e))
  }

  pub(crate) fn source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
