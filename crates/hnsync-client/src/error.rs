//! Error type for `hnsync-client`.

use hnsync_core::FetchError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected status {status} from {url}")]
  Status { status: StatusCode, url: String },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("update stream task did not stop in time")]
  CloseTimeout,

  #[error("update stream task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl FetchError for Error {
  fn is_transient(&self) -> bool {
    match self {
      Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
      Error::Status { status, .. } => {
        status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
      }
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn server_errors_and_throttling_are_transient() {
    let status = |s| Error::Status { status: s, url: "u".into() };
    assert!(status(StatusCode::BAD_GATEWAY).is_transient());
    assert!(status(StatusCode::TOO_MANY_REQUESTS).is_transient());
    assert!(!status(StatusCode::FORBIDDEN).is_transient());
    assert!(!Error::CloseTimeout.is_transient());
  }
}
