//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are created by the authoring flow. The engagement core only touches
-- the two counters, and only inside the transaction that writes the
-- matching fact.
CREATE TABLE IF NOT EXISTS content (
    content_id  TEXT PRIMARY KEY,
    category_id TEXT NOT NULL,
    title       TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'published', 'archived')),
    view_count  INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
    like_count  INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
    created_at  TEXT NOT NULL
);

-- One row per (content, viewer). A row older than the cooldown is refreshed
-- in place and its counted_views bumped; rows are only deleted by retention.
CREATE TABLE IF NOT EXISTS views (
    view_id       TEXT PRIMARY KEY,
    content_id    TEXT NOT NULL REFERENCES content(content_id) ON DELETE CASCADE,
    user_id       TEXT,
    session_id    TEXT,
    viewer_key    TEXT NOT NULL,   -- 'user:<uuid>' | 'session:<token>'
    viewed_at     TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    counted_views INTEGER NOT NULL DEFAULT 1 CHECK (counted_views >= 1),
    ip_address    TEXT,
    user_agent    TEXT,
    UNIQUE (content_id, viewer_key),
    CHECK  ((user_id IS NULL) != (session_id IS NULL))
);

-- Existence of a row means 'liked'.
CREATE TABLE IF NOT EXISTS likes (
    like_id    TEXT PRIMARY KEY,
    content_id TEXT NOT NULL REFERENCES content(content_id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (content_id, user_id)
);

CREATE INDEX IF NOT EXISTS content_category_idx ON content(category_id, status);
CREATE INDEX IF NOT EXISTS views_viewed_at_idx  ON views(viewed_at);

PRAGMA user_version = 1;
";
