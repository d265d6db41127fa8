//! The `ItemSource` trait: key-by-ID access to the remote API.
//!
//! Implemented by `hnsync-client` over HTTP and by in-memory fakes in tests.

use std::future::Future;

use crate::{
  error::FetchError,
  item::{Item, ItemId},
  user::User,
};

/// Read-only access to the remote content API.
///
/// A lookup that returns `Ok(None)` means the source has no record for the
/// key (never existed, or purged); it is never an error.
pub trait ItemSource: Send + Sync {
  type Error: FetchError;

  /// Fetch a single item by ID.
  fn fetch_item(
    &self,
    id: ItemId,
  ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send + '_;

  /// Fetch a single user profile by handle.
  fn fetch_user<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// The highest item ID the source has assigned so far.
  fn max_item(&self) -> impl Future<Output = Result<ItemId, Self::Error>> + Send + '_;
}
