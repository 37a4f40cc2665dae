//! Engagement facts and the outcomes reported for them.
//!
//! The `views` and `likes` fact tables are the source of truth; the counters
//! on [`ContentItem`](crate::content::ContentItem) are a denormalised
//! aggregate kept in lock-step with them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::ViewerIdentity;

/// Default cooldown, in seconds, before a repeat view from the same identity
/// counts again.
pub const DEFAULT_VIEW_COOLDOWN_SECS: i64 = 24 * 60 * 60;

pub fn default_view_cooldown() -> Duration {
  Duration::seconds(DEFAULT_VIEW_COOLDOWN_SECS)
}

// ─── Facts ───────────────────────────────────────────────────────────────────

/// Request metadata stored alongside a view for analytics only. Never
/// consulted when deduplicating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMeta {
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
}

/// One counted view. At most one row exists per (content, viewer); a row
/// older than the cooldown is refreshed in place rather than duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewFact {
  pub view_id:    Uuid,
  pub content_id: Uuid,
  pub viewer:     ViewerIdentity,
  pub viewed_at:  DateTime<Utc>,
  pub meta:       ViewMeta,
}

/// Existence of this row means "`user_id` likes `content_id`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeFact {
  pub like_id:    Uuid,
  pub content_id: Uuid,
  pub user_id:    Uuid,
  pub created_at: DateTime<Utc>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`EngagementStore::record_view`](crate::store::EngagementStore::record_view).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOutcome {
  /// `false` for duplicates inside the cooldown and for anonymous calls
  /// that carried no identity at all.
  pub counted:    bool,
  pub view_count: u64,
}

/// Result of the like operations: the caller's state after the call and the
/// item's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
  pub liked:      bool,
  pub like_count: u64,
}

/// What a like operation should do with the caller's like state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
  /// Flip: like if absent, unlike if present.
  Toggle,
  /// Ensure a like exists. No-op if it already does.
  Like,
  /// Ensure no like exists. No-op if none does.
  Unlike,
}

impl LikeAction {
  /// Whether the caller should end up liking the item, given the current
  /// state.
  pub fn target(self, currently_liked: bool) -> bool {
    match self {
      Self::Toggle => !currently_liked,
      Self::Like => true,
      Self::Unlike => false,
    }
  }
}
