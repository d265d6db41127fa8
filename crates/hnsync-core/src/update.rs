//! Change notifications pushed by the source's update feed.

use serde::{Deserialize, Serialize};

use crate::item::ItemId;

/// The set of items and profiles the source reports as changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotice {
  #[serde(default)]
  pub items:    Vec<ItemId>,
  #[serde(default)]
  pub profiles: Vec<String>,
}

impl UpdateNotice {
  pub fn is_empty(&self) -> bool { self.items.is_empty() && self.profiles.is_empty() }
}
