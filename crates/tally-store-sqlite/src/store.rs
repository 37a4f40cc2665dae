//! [`SqliteStore`]: the SQLite implementation of [`EngagementStore`].

use std::{path::Path, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use tally_core::{
  content::{ContentItem, ContentStatus, NewContent},
  engagement::{
    LikeAction, LikeFact, LikeOutcome, ViewFact, ViewMeta, ViewOutcome,
    default_view_cooldown,
  },
  identity::ViewerIdentity,
  store::EngagementStore,
};

use crate::{
  Error, Result,
  encode::{CONTENT_COLUMNS, RawContent, decode_count, encode_dt, encode_uuid},
  error::is_unique_violation,
  retry::RetryPolicy,
  schema::SCHEMA,
};

/// How long a connection waits on a locked database before reporting
/// `SQLITE_BUSY`.
const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the engagement writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
  /// A repeat view from the same identity counts again only once its
  /// previous counted view is at least this old.
  pub view_cooldown: Duration,
  pub retry:         RetryPolicy,
}

impl Default for StorePolicy {
  fn default() -> Self {
    Self { view_cooldown: default_view_cooldown(), retry: RetryPolicy::default() }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally engagement store backed by a single SQLite file.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  policy:          StorePolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: StorePolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: StorePolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the default [`StorePolicy`].
  pub fn with_policy(mut self, policy: StorePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> StorePolicy { self.policy }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread under the store's retry policy.
  ///
  /// `f` may run more than once, so it must own (or clone) everything it
  /// needs and be safe to repeat; every writer wraps its statements in one
  /// transaction, which a failed attempt rolls back.
  async fn call_with_retry<T, F>(&self, name: &'static str, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: Fn(&mut rusqlite::Connection) -> tokio_rusqlite::Result<T>
      + Clone
      + Send
      + Sync
      + 'static,
  {
    self
      .policy
      .retry
      .run(name, || {
        let f = f.clone();
        let conn = self.conn.clone();
        async move { Ok(conn.call(move |c| f(c)).await?) }
      })
      .await
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────

/// Read one counter column, or `None` if the content does not exist.
fn current_count(
  tx: &rusqlite::Transaction<'_>,
  column: &'static str,
  content_id: &str,
) -> rusqlite::Result<Option<i64>> {
  tx.query_row(
    &format!("SELECT {column} FROM content WHERE content_id = ?1"),
    rusqlite::params![content_id],
    |r| r.get(0),
  )
  .optional()
}

/// Columns of a [`ViewFact`] as bound into the upsert.
#[derive(Clone)]
struct ViewRow {
  view_id:    String,
  content_id: String,
  user_id:    Option<String>,
  session_id: Option<String>,
  viewer_key: String,
  viewed_at:  String,
  ip_address: Option<String>,
  user_agent: Option<String>,
}

impl From<&ViewFact> for ViewRow {
  fn from(fact: &ViewFact) -> Self {
    Self {
      view_id:    encode_uuid(fact.view_id),
      content_id: encode_uuid(fact.content_id),
      user_id:    fact.viewer.user_id().map(encode_uuid),
      session_id: fact.viewer.session().map(|t| t.as_str().to_owned()),
      viewer_key: fact.viewer.key(),
      viewed_at:  encode_dt(fact.viewed_at),
      ip_address: fact.meta.ip_address.clone(),
      user_agent: fact.meta.user_agent.clone(),
    }
  }
}

/// The whole view decision as one transaction. `cutoff` is the encoded
/// instant before which an existing fact no longer blocks a new count.
fn record_view_tx(
  conn: &mut rusqlite::Connection,
  content_id: &str,
  row: Option<&ViewRow>,
  cutoff: &str,
) -> rusqlite::Result<Option<(bool, i64)>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let Some(current) = current_count(&tx, "view_count", content_id)? else {
    return Ok(None);
  };
  let Some(row) = row else {
    return Ok(Some((false, current)));
  };

  let last_seen: Option<String> = tx
    .query_row(
      "SELECT viewed_at FROM views WHERE content_id = ?1 AND viewer_key = ?2",
      rusqlite::params![content_id, row.viewer_key],
      |r| r.get(0),
    )
    .optional()?;

  if last_seen.as_deref().is_some_and(|seen| seen > cutoff) {
    return Ok(Some((false, current)));
  }

  // The conflict guard repeats the cooldown check so a writer that slipped
  // in between the read and this statement cannot be double counted.
  let upserted = tx.execute(
    "INSERT INTO views (
       view_id, content_id, user_id, session_id, viewer_key,
       viewed_at, ip_address, user_agent
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (content_id, viewer_key) DO UPDATE SET
       viewed_at     = excluded.viewed_at,
       ip_address    = excluded.ip_address,
       user_agent    = excluded.user_agent,
       counted_views = views.counted_views + 1
     WHERE views.viewed_at <= ?9",
    rusqlite::params![
      row.view_id,
      row.content_id,
      row.user_id,
      row.session_id,
      row.viewer_key,
      row.viewed_at,
      row.ip_address,
      row.user_agent,
      cutoff,
    ],
  );
  let upserted = match upserted {
    Ok(n) => n,
    Err(e) if is_unique_violation(&e) => 0,
    Err(e) => return Err(e),
  };

  if upserted == 0 {
    tx.commit()?;
    return Ok(Some((false, current)));
  }

  let count: i64 = tx.query_row(
    "UPDATE content SET view_count = view_count + 1
     WHERE content_id = ?1
     RETURNING view_count",
    rusqlite::params![content_id],
    |r| r.get(0),
  )?;
  tx.commit()?;
  Ok(Some((true, count)))
}

/// Columns of a [`LikeFact`] as bound into the insert.
#[derive(Clone)]
struct LikeRow {
  like_id:    String,
  content_id: String,
  user_id:    String,
  created_at: String,
}

impl From<&LikeFact> for LikeRow {
  fn from(fact: &LikeFact) -> Self {
    Self {
      like_id:    encode_uuid(fact.like_id),
      content_id: encode_uuid(fact.content_id),
      user_id:    encode_uuid(fact.user_id),
      created_at: encode_dt(fact.created_at),
    }
  }
}

/// Check, write, and adjust the counter in one transaction. Returns
/// `(liked, like_count)`, or `None` if the content does not exist.
fn apply_like_tx(
  conn: &mut rusqlite::Connection,
  row: &LikeRow,
  action: LikeAction,
) -> rusqlite::Result<Option<(bool, i64)>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let Some(current) = current_count(&tx, "like_count", &row.content_id)? else {
    return Ok(None);
  };

  let exists = tx
    .query_row(
      "SELECT 1 FROM likes WHERE content_id = ?1 AND user_id = ?2",
      rusqlite::params![row.content_id, row.user_id],
      |_| Ok(()),
    )
    .optional()?
    .is_some();

  let liked = action.target(exists);
  if liked == exists {
    return Ok(Some((liked, current)));
  }

  let count = if liked {
    let inserted = tx.execute(
      "INSERT INTO likes (like_id, content_id, user_id, created_at)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![row.like_id, row.content_id, row.user_id, row.created_at],
    );
    match inserted {
      Ok(_) => tx.query_row(
        "UPDATE content SET like_count = like_count + 1
         WHERE content_id = ?1
         RETURNING like_count",
        rusqlite::params![row.content_id],
        |r| r.get(0),
      )?,
      // Another writer's like landed first: already liked, nothing to add.
      Err(e) if is_unique_violation(&e) => current,
      Err(e) => return Err(e),
    }
  } else {
    let removed = tx.execute(
      "DELETE FROM likes WHERE content_id = ?1 AND user_id = ?2",
      rusqlite::params![row.content_id, row.user_id],
    )?;
    if removed == 0 {
      current
    } else {
      tx.query_row(
        "UPDATE content SET like_count = MAX(like_count - 1, 0)
         WHERE content_id = ?1
         RETURNING like_count",
        rusqlite::params![row.content_id],
        |r| r.get(0),
      )?
    }
  };

  tx.commit()?;
  Ok(Some((liked, count)))
}

// ─── EngagementStore impl ────────────────────────────────────────────────────

impl EngagementStore for SqliteStore {
  type Error = Error;

  // ── Content ───────────────────────────────────────────────────────────────

  async fn add_content(&self, input: NewContent) -> Result<ContentItem> {
    let item = ContentItem {
      id:          Uuid::new_v4(),
      category_id: input.category_id,
      title:       input.title,
      status:      input.status,
      view_count:  0,
      like_count:  0,
      created_at:  Utc::now(),
    };

    let id_str       = encode_uuid(item.id);
    let category_str = encode_uuid(item.category_id);
    let title        = item.title.clone();
    let status_str   = item.status.as_str();
    let at_str       = encode_dt(item.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO content (content_id, category_id, title, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, category_str, title, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(item)
  }

  async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawContent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTENT_COLUMNS} FROM content WHERE content_id = ?1"),
              rusqlite::params![id_str],
              RawContent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContent::into_content).transpose()
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  async fn record_view(
    &self,
    content_id: Uuid,
    viewer:     Option<ViewerIdentity>,
    meta:       ViewMeta,
  ) -> Result<ViewOutcome> {
    let now = Utc::now();
    let fact = viewer.map(|viewer| ViewFact {
      view_id: Uuid::new_v4(),
      content_id,
      viewer,
      viewed_at: now,
      meta,
    });

    let content_str = encode_uuid(content_id);
    let row         = fact.as_ref().map(ViewRow::from);
    let cutoff      = encode_dt(now - self.policy.view_cooldown);

    let result = self
      .call_with_retry("record_view", move |conn| {
        Ok(record_view_tx(conn, &content_str, row.as_ref(), &cutoff)?)
      })
      .await?;

    let (counted, count) = result.ok_or(Error::ContentNotFound(content_id))?;
    if let Some(fact) = &fact {
      tracing::debug!(
        content_id = %content_id,
        viewer = %fact.viewer,
        counted,
        "view recorded"
      );
    }
    Ok(ViewOutcome { counted, view_count: decode_count(count) })
  }

  // ── Likes ─────────────────────────────────────────────────────────────────

  async fn apply_like(
    &self,
    content_id: Uuid,
    user_id:    Uuid,
    action:     LikeAction,
  ) -> Result<LikeOutcome> {
    let fact = LikeFact {
      like_id: Uuid::new_v4(),
      content_id,
      user_id,
      created_at: Utc::now(),
    };
    let row = LikeRow::from(&fact);

    let result = self
      .call_with_retry("apply_like", move |conn| {
        Ok(apply_like_tx(conn, &row, action)?)
      })
      .await?;

    let (liked, count) = result.ok_or(Error::ContentNotFound(content_id))?;
    tracing::debug!(%content_id, %user_id, ?action, liked, "like applied");
    Ok(LikeOutcome { liked, like_count: decode_count(count) })
  }

  async fn has_user_liked(&self, content_id: Uuid, user_id: Uuid) -> Result<bool> {
    let content_str = encode_uuid(content_id);
    let user_str    = encode_uuid(user_id);

    let liked = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM likes WHERE content_id = ?1 AND user_id = ?2",
              rusqlite::params![content_str, user_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;

    Ok(liked)
  }

  // ── Spotlight ─────────────────────────────────────────────────────────────

  async fn random_content(
    &self,
    category: Option<Uuid>,
    status:   ContentStatus,
  ) -> Result<Vec<ContentItem>> {
    let category_str = category.map(encode_uuid);
    let status_str   = status.as_str();

    let raws: Vec<RawContent> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(category) = category_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content
             WHERE category_id = ?1 AND status = ?2
             ORDER BY RANDOM()
             LIMIT 1"
          ))?;
          stmt
            .query_map(rusqlite::params![category, status_str], RawContent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM (
               SELECT c.*,
                      ROW_NUMBER() OVER (
                        PARTITION BY c.category_id ORDER BY RANDOM()
                      ) AS pick
               FROM content c
               WHERE c.status = ?1
             )
             WHERE pick = 1
             ORDER BY category_id"
          ))?;
          stmt
            .query_map(rusqlite::params![status_str], RawContent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContent::into_content).collect()
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn reconcile_counters(&self) -> Result<u64> {
    // like_count must equal the number of like rows. view_count may only be
    // raised: retention deletes view facts without touching the counter, so
    // a counter above the surviving facts is expected.
    let corrected = self
      .call_with_retry("reconcile_counters", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let n = tx.execute(
          "WITH facts AS (
             SELECT c.content_id,
                    (SELECT COUNT(*) FROM likes l
                      WHERE l.content_id = c.content_id) AS likes,
                    (SELECT COALESCE(SUM(v.counted_views), 0) FROM views v
                      WHERE v.content_id = c.content_id) AS views
             FROM content c
           )
           UPDATE content SET
             like_count = facts.likes,
             view_count = MAX(content.view_count, facts.views)
           FROM facts
           WHERE facts.content_id = content.content_id
             AND (content.like_count != facts.likes
                  OR content.view_count < facts.views)",
          [],
        )?;
        tx.commit()?;
        Ok(n)
      })
      .await?;

    if corrected > 0 {
      tracing::warn!(corrected, "reconciled drifted engagement counters");
    }
    Ok(corrected as u64)
  }

  async fn purge_views_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let purged = self
      .call_with_retry("purge_views_before", move |conn| {
        Ok(conn.execute(
          "DELETE FROM views WHERE viewed_at < ?1",
          rusqlite::params![cutoff_str],
        )?)
      })
      .await?;

    Ok(purged as u64)
  }
}
