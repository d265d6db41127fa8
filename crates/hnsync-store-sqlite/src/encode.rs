//! Encoding and decoding helpers between domain types and the plain column
//! representations stored in SQLite.
//!
//! ID lists (`parts`, `submitted`) are stored as comma-separated decimal
//! strings; `NULL` when the source omitted the field. The item kind is stored
//! as its lowercase name.

use std::str::FromStr as _;

use hnsync_core::{Item, ItemId, ItemKind, User};

use crate::{Error, Result};

// ─── Id lists ────────────────────────────────────────────────────────────────

pub fn encode_ids(ids: Option<&[ItemId]>) -> Option<String> {
  ids.map(|ids| {
    ids
      .iter()
      .map(ItemId::to_string)
      .collect::<Vec<_>>()
      .join(",")
  })
}

pub fn decode_ids(column: &'static str, s: Option<String>) -> Result<Option<Vec<ItemId>>> {
  let Some(s) = s else { return Ok(None) };
  if s.is_empty() {
    return Ok(Some(Vec::new()));
  }
  s.split(',')
    .map(|part| {
      part.parse::<ItemId>().map_err(|_| Error::MalformedIdList {
        column,
        value: s.clone(),
      })
    })
    .collect::<Result<Vec<_>>>()
    .map(Some)
}

// ─── ItemKind ────────────────────────────────────────────────────────────────

pub fn encode_kind(kind: Option<ItemKind>) -> Option<&'static str> {
  kind.map(<&'static str>::from)
}

pub fn decode_kind(s: Option<String>) -> Result<Option<ItemKind>> {
  s.map(|s| ItemKind::from_str(&s).map_err(|_| hnsync_core::Error::UnknownItemKind(s)))
    .transpose()
    .map_err(Error::from)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Item columns in bind order, owned so they can move into a
/// `tokio_rusqlite` closure.
pub struct ItemRow {
  pub id:          ItemId,
  pub deleted:     bool,
  pub kind:        Option<&'static str>,
  pub by:          Option<String>,
  pub time:        Option<i64>,
  pub text:        Option<String>,
  pub dead:        bool,
  pub parent:      Option<ItemId>,
  pub poll:        Option<ItemId>,
  pub url:         Option<String>,
  pub score:       Option<i64>,
  pub title:       Option<String>,
  pub parts:       Option<String>,
  pub descendants: Option<i64>,
  /// `(kid, display_order)` pairs; `None` when the item has no `kids` field.
  pub kids:        Option<Vec<(ItemId, i64)>>,
}

impl ItemRow {
  pub fn from_item(item: Item) -> Self {
    let kids = item.kids.as_ref().map(|_| {
      item
        .kid_edges()
        .into_iter()
        .map(|e| (e.kid, e.display_order))
        .collect()
    });
    Self {
      id: item.id,
      deleted: item.deleted,
      kind: encode_kind(item.kind),
      parts: encode_ids(item.parts.as_deref()),
      by: item.by,
      time: item.time,
      text: item.text,
      dead: item.dead,
      parent: item.parent,
      poll: item.poll,
      url: item.url,
      score: item.score,
      title: item.title,
      descendants: item.descendants,
      kids,
    }
  }
}

/// Raw values read directly from an `items` row.
pub struct RawItem {
  pub id:          ItemId,
  pub deleted:     Option<bool>,
  pub kind:        Option<String>,
  pub by:          Option<String>,
  pub time:        Option<i64>,
  pub text:        Option<String>,
  pub dead:        Option<bool>,
  pub parent:      Option<ItemId>,
  pub poll:        Option<ItemId>,
  pub url:         Option<String>,
  pub score:       Option<i64>,
  pub title:       Option<String>,
  pub parts:       Option<String>,
  pub descendants: Option<i64>,
}

impl RawItem {
  /// `kids` comes from the `kids` table; pass `None` when the item has no
  /// stored edges.
  pub fn into_item(self, kids: Option<Vec<ItemId>>) -> Result<Item> {
    Ok(Item {
      id:          self.id,
      deleted:     self.deleted.unwrap_or(false),
      kind:        decode_kind(self.kind)?,
      by:          self.by,
      time:        self.time,
      text:        self.text,
      dead:        self.dead.unwrap_or(false),
      parent:      self.parent,
      poll:        self.poll,
      kids,
      url:         self.url,
      score:       self.score,
      title:       self.title,
      parts:       decode_ids("items.parts", self.parts)?,
      descendants: self.descendants,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:        String,
  pub created:   Option<i64>,
  pub karma:     Option<i64>,
  pub about:     Option<String>,
  pub submitted: Option<String>,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:        self.id,
      created:   self.created.unwrap_or_default(),
      karma:     self.karma.unwrap_or_default(),
      about:     self.about,
      submitted: decode_ids("users.submitted", self.submitted)?,
    })
  }
}
