//! Items: the nodes of the source's content tree.
//!
//! Every story, comment, job, poll and poll option is an item. Items refer to
//! each other through `parent`, `poll`, `parts` and the ordered `kids` list.
//! The `kids` list is persisted separately as [`KidEdge`] rows because its
//! order cannot be reconstructed from child-side `parent` pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Source-assigned item identifier. Positive, stable, never reused.
pub type ItemId = i64;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The item type, serialized by the source as the `type` field.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
  Story,
  Comment,
  Job,
  Poll,
  #[serde(rename = "pollopt")]
  #[strum(serialize = "pollopt")]
  PollOpt,
}

// ─── Item ────────────────────────────────────────────────────────────────────

/// A full item record as returned by the source.
///
/// The source omits fields rather than sending `null`, so everything except
/// `id` is defaulted on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  pub id:          ItemId,
  #[serde(default)]
  pub deleted:     bool,
  #[serde(rename = "type", default)]
  pub kind:        Option<ItemKind>,
  #[serde(default)]
  pub by:          Option<String>,
  /// Creation time, unix seconds.
  #[serde(default)]
  pub time:        Option<i64>,
  #[serde(default)]
  pub text:        Option<String>,
  #[serde(default)]
  pub dead:        bool,
  #[serde(default)]
  pub parent:      Option<ItemId>,
  #[serde(default)]
  pub poll:        Option<ItemId>,
  /// Children in display order.
  #[serde(default)]
  pub kids:        Option<Vec<ItemId>>,
  #[serde(default)]
  pub url:         Option<String>,
  #[serde(default)]
  pub score:       Option<i64>,
  #[serde(default)]
  pub title:       Option<String>,
  /// Poll options, in order.
  #[serde(default)]
  pub parts:       Option<Vec<ItemId>>,
  /// Total comment count, maintained by the source.
  #[serde(default)]
  pub descendants: Option<i64>,
}

impl Item {
  /// A bare item with only an id; handy as a starting point in tests.
  pub fn new(id: ItemId) -> Self {
    Self {
      id,
      deleted: false,
      kind: None,
      by: None,
      time: None,
      text: None,
      dead: false,
      parent: None,
      poll: None,
      kids: None,
      url: None,
      score: None,
      title: None,
      parts: None,
      descendants: None,
    }
  }

  /// Creation time as a UTC timestamp, if present and in range.
  pub fn posted_at(&self) -> Option<DateTime<Utc>> {
    self.time.and_then(|t| DateTime::from_timestamp(t, 0))
  }

  /// The ordered child edges of this item. Empty when `kids` is absent.
  pub fn kid_edges(&self) -> Vec<KidEdge> {
    self
      .kids
      .iter()
      .flatten()
      .enumerate()
      .map(|(order, &kid)| KidEdge {
        item:          self.id,
        kid,
        display_order: order as i64,
      })
      .collect()
  }
}

// ─── Kid edges ───────────────────────────────────────────────────────────────

/// One position in a parent's ordered child list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KidEdge {
  pub item:          ItemId,
  pub kid:           ItemId,
  /// 0-based position in the parent's `kids` list.
  pub display_order: i64,
}
