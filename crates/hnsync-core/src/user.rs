//! Users: the authors referenced by `Item::by`.

use serde::{Deserialize, Serialize};

use crate::item::ItemId;

/// A user profile as returned by the source. The handle is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:        String,
  /// Account creation time, unix seconds.
  pub created:   i64,
  #[serde(default)]
  pub karma:     i64,
  #[serde(default)]
  pub about:     Option<String>,
  /// The source's own list of submissions; a cache, not authoritative.
  #[serde(default)]
  pub submitted: Option<Vec<ItemId>>,
}
