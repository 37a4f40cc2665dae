//! The `EngagementStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! Higher layers (`tally-api`, `tally-spotlight`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  content::{ContentItem, ContentStatus, NewContent},
  engagement::{LikeAction, LikeOutcome, ViewMeta, ViewOutcome},
  error::Classify,
  identity::ViewerIdentity,
};

/// Abstraction over the persistent counter store.
///
/// Every counter mutation happens inside the same transaction as the fact
/// write that justifies it, and the fact tables carry uniqueness constraints
/// so concurrent duplicates from other processes cannot double-count. There
/// is no in-process coordination: implementations must be correct when
/// several server processes share one database.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EngagementStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Content ───────────────────────────────────────────────────────────

  /// Persist a new content item with both counters at zero.
  fn add_content(
    &self,
    input: NewContent,
  ) -> impl Future<Output = Result<ContentItem, Self::Error>> + Send + '_;

  /// Retrieve a content item and its last-known counters. Returns `None`
  /// if not found.
  fn get_content(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ContentItem>, Self::Error>> + Send + '_;

  // ── Views ─────────────────────────────────────────────────────────────

  /// Record a view of `content_id`.
  ///
  /// The view counts when `viewer` has no fact for this item or its fact is
  /// older than the cooldown; the fact upsert and the counter increment
  /// commit together. A `None` viewer is a no-op that reports the current
  /// counter. Errors with a not-found error if the item does not exist.
  fn record_view(
    &self,
    content_id: Uuid,
    viewer: Option<ViewerIdentity>,
    meta: ViewMeta,
  ) -> impl Future<Output = Result<ViewOutcome, Self::Error>> + Send + '_;

  // ── Likes ─────────────────────────────────────────────────────────────

  /// Apply `action` to `user_id`'s like of `content_id`, keeping
  /// `like_count` in lock-step with the `likes` table. The counter never
  /// goes below zero.
  fn apply_like(
    &self,
    content_id: Uuid,
    user_id: Uuid,
    action: LikeAction,
  ) -> impl Future<Output = Result<LikeOutcome, Self::Error>> + Send + '_;

  /// Flip `user_id`'s like of `content_id`.
  fn toggle_like(
    &self,
    content_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<LikeOutcome, Self::Error>> + Send + '_ {
    self.apply_like(content_id, user_id, LikeAction::Toggle)
  }

  /// Ensure `user_id` likes `content_id`. Concurrent identical calls
  /// increment the counter exactly once.
  fn like(
    &self,
    content_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<LikeOutcome, Self::Error>> + Send + '_ {
    self.apply_like(content_id, user_id, LikeAction::Like)
  }

  /// Ensure `user_id` does not like `content_id`.
  fn unlike(
    &self,
    content_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<LikeOutcome, Self::Error>> + Send + '_ {
    self.apply_like(content_id, user_id, LikeAction::Unlike)
  }

  /// Pure existence check against the `likes` table.
  fn has_user_liked(
    &self,
    content_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Spotlight ─────────────────────────────────────────────────────────

  /// Pick random items with `status`: one per category when `category` is
  /// `None`, otherwise at most one from that category.
  fn random_content(
    &self,
    category: Option<Uuid>,
    status: ContentStatus,
  ) -> impl Future<Output = Result<Vec<ContentItem>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Recompute both counters from the fact tables for every item whose
  /// stored value diverges. Returns the number of items corrected.
  fn reconcile_counters(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete view facts recorded before `cutoff`. Counters are left alone.
  /// Returns the number of facts deleted.
  fn purge_views_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
