//! The update-feed subscription seen by the pipeline.
//!
//! A subscription is a channel of [`UpdateNotice`]s plus a handle that tears
//! the underlying connection down. The tailer owns the receiver; whoever owns
//! the process lifecycle owns the handle.

use std::future::Future;

use tokio::sync::mpsc;

use crate::update::UpdateNotice;

/// Tears down a running feed subscription.
pub trait FeedHandle: Send + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Stop the feed and wait for its background work to finish.
  fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A live subscription: notices arrive on `notices` until `handle` is closed.
pub struct Subscription<H> {
  pub notices: mpsc::Receiver<UpdateNotice>,
  pub handle:  H,
}
