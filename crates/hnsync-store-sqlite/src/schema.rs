//! SQL schema for the hnsync SQLite sink.
//!
//! Executed once at connection startup. Idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`; there are no migrations.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS items (
    id          INTEGER PRIMARY KEY,
    deleted     BOOLEAN,
    type        TEXT,      -- 'story' | 'comment' | 'job' | 'poll' | 'pollopt'
    by          TEXT,      -- users.id, not enforced: authors may not be ingested yet
    time        INTEGER,
    text        TEXT,
    dead        BOOLEAN,
    parent      INTEGER,
    poll        INTEGER,
    url         TEXT,
    score       INTEGER,
    title       TEXT,
    parts       TEXT,      -- comma-separated item ids
    descendants INTEGER
) WITHOUT ROWID;

-- Ordered child lists. Kids may reference items that are not stored yet,
-- so there are no foreign keys.
CREATE TABLE IF NOT EXISTS kids (
    item          INTEGER NOT NULL,
    kid           INTEGER NOT NULL,
    display_order INTEGER NOT NULL,
    UNIQUE (item, kid)
);

CREATE TABLE IF NOT EXISTS users (
    id        TEXT PRIMARY KEY,
    created   INTEGER,
    karma     INTEGER,
    about     TEXT,
    submitted TEXT         -- comma-separated item ids
);

-- IDs the source answered with nothing; gap fills skip them.
CREATE TABLE IF NOT EXISTS absent_items (
    id INTEGER PRIMARY KEY
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS kids_item_idx ON kids(item);
CREATE INDEX IF NOT EXISTS items_by_idx  ON items(by);
";
