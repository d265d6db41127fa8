//! Error type for `hnsync-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] hnsync_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A delimited id column held something other than comma-separated integers.
  #[error("malformed id list in column {column}: {value:?}")]
  MalformedIdList { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
