//! Content items: the rows whose counters the engagement core maintains.
//!
//! Content is created by an outside authoring flow; this crate only ever
//! reads it and mutates its two counters.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Publication state of a content item.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
  Draft,
  #[default]
  Published,
  Archived,
}

impl ContentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Published => "published",
      Self::Archived => "archived",
    }
  }
}

impl fmt::Display for ContentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ContentStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "draft" => Ok(Self::Draft),
      "published" => Ok(Self::Published),
      "archived" => Ok(Self::Archived),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

/// A post together with its denormalised engagement counters.
///
/// `view_count` and `like_count` always converge on the number of rows in
/// the `views` and `likes` fact tables for this item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
  pub id:          Uuid,
  pub category_id: Uuid,
  pub title:       String,
  pub status:      ContentStatus,
  pub view_count:  u64,
  pub like_count:  u64,
  pub created_at:  DateTime<Utc>,
}

/// Input for creating a content item. Counters always start at zero.
#[derive(Debug, Clone)]
pub struct NewContent {
  pub category_id: Uuid,
  pub title:       String,
  pub status:      ContentStatus,
}

impl NewContent {
  /// A published item in `category_id`.
  pub fn published(category_id: Uuid, title: impl Into<String>) -> Self {
    Self { category_id, title: title.into(), status: ContentStatus::Published }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_parses_its_own_display() {
    for status in
      [ContentStatus::Draft, ContentStatus::Published, ContentStatus::Archived]
    {
      assert_eq!(status.to_string().parse::<ContentStatus>().unwrap(), status);
    }
  }

  #[test]
  fn unknown_status_is_rejected() {
    let err = "deleted".parse::<ContentStatus>().unwrap_err();
    assert!(matches!(err, Error::UnknownStatus(ref s) if s == "deleted"));
  }

  #[test]
  fn content_item_serialises_camel_case() {
    let item = ContentItem {
      id:          Uuid::nil(),
      category_id: Uuid::nil(),
      title:       "hello".into(),
      status:      ContentStatus::Published,
      view_count:  3,
      like_count:  1,
      created_at:  Utc::now(),
    };
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["viewCount"], 3);
    assert_eq!(json["likeCount"], 1);
    assert_eq!(json["status"], "published");
  }
}
