//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix), so comparing the text compares the instants.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use tally_core::content::ContentItem;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Counters ─────────────────────────────────────────────────────────────────

/// Counter columns are `CHECK (>= 0)`; clamp anyway rather than wrap.
pub fn decode_count(n: i64) -> u64 { u64::try_from(n).unwrap_or(0) }

// ─── Raw row types ────────────────────────────────────────────────────────────

/// The column list every [`RawContent`] query selects, in order.
pub const CONTENT_COLUMNS: &str =
  "content_id, category_id, title, status, view_count, like_count, created_at";

/// Untyped row from the `content` table.
pub struct RawContent {
  pub content_id:  String,
  pub category_id: String,
  pub title:       String,
  pub status:      String,
  pub view_count:  i64,
  pub like_count:  i64,
  pub created_at:  String,
}

impl RawContent {
  /// Read a row selected with [`CONTENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      content_id:  row.get(0)?,
      category_id: row.get(1)?,
      title:       row.get(2)?,
      status:      row.get(3)?,
      view_count:  row.get(4)?,
      like_count:  row.get(5)?,
      created_at:  row.get(6)?,
    })
  }

  pub fn into_content(self) -> Result<ContentItem> {
    Ok(ContentItem {
      id:          decode_uuid(&self.content_id)?,
      category_id: decode_uuid(&self.category_id)?,
      title:       self.title,
      status:      self.status.parse()?,
      view_count:  decode_count(self.view_count),
      like_count:  decode_count(self.like_count),
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let whole = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let later = whole + Duration::microseconds(7);
    let a = encode_dt(whole);
    let b = encode_dt(later);
    assert_eq!(a.len(), b.len());
    assert!(a < b, "{a} should sort before {b}");
    assert_eq!(decode_dt(&a).unwrap(), whole);
  }

  #[test]
  fn negative_counts_clamp_to_zero() {
    assert_eq!(decode_count(-1), 0);
    assert_eq!(decode_count(42), 42);
  }
}
