//! [`SqliteSink`]: the SQLite implementation of [`RecordSink`].

use std::path::Path;

use hnsync_core::{
  Item, ItemId, KidEdge, User,
  sink::{ConflictPolicy, KidsPolicy, RecordSink, SinkWrite, WritePolicy},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{ItemRow, RawItem, RawUser, encode_ids},
  schema::SCHEMA,
};

const ITEM_COLUMNS: &str =
  "id, deleted, type, by, time, text, dead, parent, poll, url, score, title, parts, descendants";

// ─── Sink ────────────────────────────────────────────────────────────────────

/// An item/user sink backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteSink {
  conn: tokio_rusqlite::Connection,
}

impl SqliteSink {
  /// Open (or create) a sink at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let sink = Self { conn };
    sink.init_schema().await?;
    Ok(sink)
  }

  /// Open an in-memory sink: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let sink = Self { conn };
    sink.init_schema().await?;
    Ok(sink)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Total number of stored kid edges.
  pub async fn kid_edge_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM kids", [], |r| r.get(0))?))
      .await?;
    Ok(count as u64)
  }
}

/// Write one item row and reconcile its kid edges. Returns
/// `(rows_written, edges_written)`.
fn upsert_item(
  tx: &rusqlite::Transaction<'_>,
  row: ItemRow,
  policy: WritePolicy,
) -> rusqlite::Result<(usize, usize)> {
  let verb = match policy.conflict {
    ConflictPolicy::Replace => "INSERT OR REPLACE",
    ConflictPolicy::Ignore => "INSERT OR IGNORE",
  };
  let written = tx
    .prepare_cached(&format!(
      "{verb} INTO items ({ITEM_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    ))?
    .execute(rusqlite::params![
      row.id,
      row.deleted,
      row.kind,
      row.by,
      row.time,
      row.text,
      row.dead,
      row.parent,
      row.poll,
      row.url,
      row.score,
      row.title,
      row.parts,
      row.descendants,
    ])?;

  // An ignored row keeps the edges that came with it.
  if written == 0 {
    return Ok((0, 0));
  }

  if policy.kids == KidsPolicy::Replace {
    tx.prepare_cached("DELETE FROM kids WHERE item = ?1")?
      .execute(rusqlite::params![row.id])?;
  }

  let mut edges = 0;
  if let Some(kids) = row.kids {
    let mut stmt = tx.prepare_cached(
      "INSERT OR REPLACE INTO kids (item, kid, display_order) VALUES (?1, ?2, ?3)",
    )?;
    for (kid, order) in kids {
      edges += stmt.execute(rusqlite::params![row.id, kid, order])?;
    }
  }

  Ok((written, edges))
}

// ─── RecordSink impl ─────────────────────────────────────────────────────────

impl RecordSink for SqliteSink {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn write_items(&self, items: Vec<Item>, policy: WritePolicy) -> Result<SinkWrite> {
    if items.is_empty() {
      return Ok(SinkWrite::default());
    }
    let rows: Vec<ItemRow> = items.into_iter().map(ItemRow::from_item).collect();

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut write = SinkWrite::default();
        for row in rows {
          let (records, edges) = upsert_item(&tx, row, policy)?;
          write.records += records;
          write.kid_edges += edges;
        }
        tx.commit()?;
        Ok(write)
      })
      .await?;

    tracing::trace!(records = write.records, kid_edges = write.kid_edges, "wrote items");
    Ok(write)
  }

  async fn write_users(&self, users: Vec<User>, policy: WritePolicy) -> Result<SinkWrite> {
    if users.is_empty() {
      return Ok(SinkWrite::default());
    }
    let verb = match policy.conflict {
      ConflictPolicy::Replace => "INSERT OR REPLACE",
      ConflictPolicy::Ignore => "INSERT OR IGNORE",
    };
    let sql = format!(
      "{verb} INTO users (id, created, karma, about, submitted) VALUES (?1, ?2, ?3, ?4, ?5)"
    );

    let records = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut records = 0;
        {
          let mut stmt = tx.prepare_cached(&sql)?;
          for user in users {
            let submitted = encode_ids(user.submitted.as_deref());
            records += stmt.execute(rusqlite::params![
              user.id,
              user.created,
              user.karma,
              user.about,
              submitted,
            ])?;
          }
        }
        tx.commit()?;
        Ok(records)
      })
      .await?;

    Ok(SinkWrite { records, kid_edges: 0 })
  }

  async fn record_absent(&self, ids: Vec<ItemId>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let recorded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut recorded = 0;
        {
          let mut stmt = tx.prepare_cached("INSERT OR IGNORE INTO absent_items (id) VALUES (?1)")?;
          for id in ids {
            recorded += stmt.execute(rusqlite::params![id])?;
          }
        }
        tx.commit()?;
        Ok(recorded)
      })
      .await?;

    tracing::trace!(recorded, "recorded absent items");
    Ok(recorded)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn max_item_id(&self) -> Result<ItemId> {
    let max: Option<ItemId> = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT MAX(id) FROM items", [], |r| r.get(0))?))
      .await?;
    Ok(max.unwrap_or(0))
  }

  async fn missing_item_ids(&self, upper: ItemId, limit: usize) -> Result<Vec<ItemId>> {
    let missing = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id FROM items WHERE id BETWEEN 1 AND ?1
           UNION
           SELECT id FROM absent_items WHERE id BETWEEN 1 AND ?1
           ORDER BY id DESC",
        )?;
        let mut rows = stmt.query(rusqlite::params![upper])?;

        // Walk known ids downwards and emit every id skipped in between.
        let mut missing = Vec::new();
        let mut expected = upper;
        while missing.len() < limit {
          let Some(row) = rows.next()? else { break };
          let id: ItemId = row.get(0)?;
          let room = limit - missing.len();
          missing.extend((id + 1..=expected).rev().take(room));
          expected = id - 1;
        }
        let room = limit - missing.len();
        missing.extend((1..=expected).rev().take(room));
        Ok(missing)
      })
      .await?;
    Ok(missing)
  }

  async fn missing_authors(&self) -> Result<Vec<String>> {
    let handles = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT i.by
           FROM items i
           LEFT JOIN users u ON u.id = i.by
           WHERE i.by IS NOT NULL AND u.id IS NULL
           ORDER BY i.by",
        )?;
        let rows = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(handles)
  }

  async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
    let raw: Option<(RawItem, Vec<ItemId>)> = self
      .conn
      .call(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
            rusqlite::params![id],
            |row| {
              Ok(RawItem {
                id:          row.get(0)?,
                deleted:     row.get(1)?,
                kind:        row.get(2)?,
                by:          row.get(3)?,
                time:        row.get(4)?,
                text:        row.get(5)?,
                dead:        row.get(6)?,
                parent:      row.get(7)?,
                poll:        row.get(8)?,
                url:         row.get(9)?,
                score:       row.get(10)?,
                title:       row.get(11)?,
                parts:       row.get(12)?,
                descendants: row.get(13)?,
              })
            },
          )
          .optional()?;
        let Some(raw) = raw else { return Ok(None) };

        let mut stmt =
          conn.prepare("SELECT kid FROM kids WHERE item = ?1 ORDER BY display_order")?;
        let kids = stmt
          .query_map(rusqlite::params![id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<ItemId>>>()?;
        Ok(Some((raw, kids)))
      })
      .await?;

    raw
      .map(|(raw, kids)| raw.into_item((!kids.is_empty()).then_some(kids)))
      .transpose()
  }

  async fn get_kids(&self, id: ItemId) -> Result<Vec<KidEdge>> {
    let edges = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT item, kid, display_order FROM kids WHERE item = ?1 ORDER BY display_order",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(KidEdge {
              item:          row.get(0)?,
              kid:           row.get(1)?,
              display_order: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(edges)
  }

  async fn get_user(&self, handle: &str) -> Result<Option<User>> {
    let handle = handle.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, created, karma, about, submitted FROM users WHERE id = ?1",
            rusqlite::params![handle],
            |row| {
              Ok(RawUser {
                id:        row.get(0)?,
                created:   row.get(1)?,
                karma:     row.get(2)?,
                about:     row.get(3)?,
                submitted: row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn close(&self) -> Result<()> {
    self.conn.clone().close().await?;
    tracing::debug!("sqlite connection closed");
    Ok(())
  }
}
