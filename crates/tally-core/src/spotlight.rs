//! The spotlight cache contract.
//!
//! Spotlight content is a random pick per category, shown on decorative
//! discovery surfaces. Selecting it is an expensive `ORDER BY RANDOM()` scan,
//! so reads go through a short-lived cache. Staleness is acceptable; there is
//! no invalidation on content writes.

use std::fmt;

use uuid::Uuid;

use crate::content::{ContentItem, ContentStatus};

/// Identifies one cached spotlight selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpotlightKey {
  /// `None` means one pick from every category.
  pub category: Option<Uuid>,
  pub status:   ContentStatus,
}

impl SpotlightKey {
  pub fn new(category: Option<Uuid>, status: ContentStatus) -> Self {
    Self { category, status }
  }
}

/// Renders as `"{category|all}:{status}"`.
impl fmt::Display for SpotlightKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.category {
      Some(id) => write!(f, "{}:{}", id.hyphenated(), self.status),
      None => write!(f, "all:{}", self.status),
    }
  }
}

/// Storage for spotlight selections. Implementations decide where entries
/// live (process memory, a shared cache service) and own their expiry.
///
/// Methods are synchronous: an in-process implementation never suspends,
/// and call sites must not hold the cache across an `.await`.
pub trait SpotlightCache: Send + Sync {
  /// Return the entry for `key` if present and not expired.
  fn get(&self, key: &SpotlightKey) -> Option<Vec<ContentItem>>;

  /// Store `items` under `key`, replacing any previous entry.
  fn set(&self, key: SpotlightKey, items: Vec<ContentItem>);

  /// Drop the entry for `key`, expired or not.
  fn evict(&self, key: &SpotlightKey);

  /// Drop every expired entry and return how many were removed.
  fn sweep(&self) -> usize;
}
