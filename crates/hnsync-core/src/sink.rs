//! The `RecordSink` trait and the write policies it honours.
//!
//! The trait is implemented by storage backends (e.g. `hnsync-store-sqlite`).
//! The pipeline depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  item::{Item, ItemId, KidEdge},
  user::User,
};

// ─── Policies ────────────────────────────────────────────────────────────────

/// What to do when a record with the same key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
  /// Overwrite every column with the freshly fetched record.
  #[default]
  Replace,
  /// Keep the stored row; used by insert-only historical loads.
  Ignore,
}

/// How a parent's kid edges are reconciled with a newly supplied list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KidsPolicy {
  /// Drop the parent's stored edges and insert the supplied list.
  #[default]
  Replace,
  /// Upsert the supplied edges; edges missing from the new list remain.
  Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WritePolicy {
  #[serde(default)]
  pub conflict: ConflictPolicy,
  #[serde(default)]
  pub kids:     KidsPolicy,
}

impl WritePolicy {
  /// First write wins; edges of pre-existing rows are left alone.
  pub fn insert_only() -> Self {
    Self { conflict: ConflictPolicy::Ignore, kids: KidsPolicy::Additive }
  }
}

/// Row counts produced by one transactional write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkWrite {
  /// Records inserted or replaced.
  pub records:   usize,
  /// Kid edges inserted or replaced.
  pub kid_edges: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store the ingester writes into.
///
/// Every write method applies its whole input in one transaction. No method
/// ever deletes an item or user row.
pub trait RecordSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert items and their kid edges.
  fn write_items(
    &self,
    items: Vec<Item>,
    policy: WritePolicy,
  ) -> impl Future<Output = Result<SinkWrite, Self::Error>> + Send + '_;

  /// Upsert user profiles. Only `policy.conflict` applies.
  fn write_users(
    &self,
    users: Vec<User>,
    policy: WritePolicy,
  ) -> impl Future<Output = Result<SinkWrite, Self::Error>> + Send + '_;

  /// Remember that the source has no item for each of `ids`, so later gap
  /// fills skip them. Returns how many were not already recorded.
  fn record_absent(
    &self,
    ids: Vec<ItemId>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Highest stored item ID, or 0 for an empty store.
  fn max_item_id(&self) -> impl Future<Output = Result<ItemId, Self::Error>> + Send + '_;

  /// Up to `limit` IDs in `1..=upper` that have neither a stored item nor
  /// an absence record, highest first.
  fn missing_item_ids(
    &self,
    upper: ItemId,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ItemId>, Self::Error>> + Send + '_;

  /// Author handles referenced by stored items that have no user row.
  fn missing_authors(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn get_item(
    &self,
    id: ItemId,
  ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send + '_;

  /// Stored kid edges of `id`, in display order.
  fn get_kids(&self, id: ItemId) -> impl Future<Output = Result<Vec<KidEdge>, Self::Error>> + Send + '_;

  fn get_user<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Flush and close the underlying connection. Later calls fail.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
