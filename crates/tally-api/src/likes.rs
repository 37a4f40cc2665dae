//! Handlers for `/content/{id}/like`.
//!
//! | Method   | Notes |
//! |----------|-------|
//! | `POST`   | Toggle; returns the new state |
//! | `PUT`    | Like; idempotent |
//! | `DELETE` | Unlike; idempotent |
//! | `GET`    | `{"liked", "likeCount"}` for the caller |
//!
//! Every route requires an authenticated user. Failures are reported as
//! errors; no handler guesses at a like state it could not read.

use axum::{
  Json,
  extract::{Path, State},
};
use tally_core::{
  engagement::{LikeAction, LikeOutcome},
  spotlight::SpotlightCache,
  store::EngagementStore,
};

use crate::{AppState, error::ApiError, identity::AuthenticatedUser, parse_content_id};

// ─── Writes ───────────────────────────────────────────────────────────────────

async fn apply<S, C>(
  state: AppState<S, C>,
  raw_id: &str,
  user_id: uuid::Uuid,
  action: LikeAction,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  let content_id = parse_content_id(raw_id)?;
  let store = state.store.clone();
  let outcome = tokio::spawn(async move {
    store.apply_like(content_id, user_id, action).await
  })
  .await?
  .map_err(ApiError::store)?;

  tracing::debug!(%content_id, %user_id, ?action, liked = outcome.liked, "like applied");
  Ok(Json(outcome))
}

/// `POST /content/{id}/like`
pub async fn toggle<S, C>(
  State(state): State<AppState<S, C>>,
  Path(raw_id): Path<String>,
  AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  apply(state, &raw_id, user_id, LikeAction::Toggle).await
}

/// `PUT /content/{id}/like`
pub async fn like<S, C>(
  State(state): State<AppState<S, C>>,
  Path(raw_id): Path<String>,
  AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  apply(state, &raw_id, user_id, LikeAction::Like).await
}

/// `DELETE /content/{id}/like`
pub async fn unlike<S, C>(
  State(state): State<AppState<S, C>>,
  Path(raw_id): Path<String>,
  AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  apply(state, &raw_id, user_id, LikeAction::Unlike).await
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /content/{id}/like`
pub async fn status<S, C>(
  State(state): State<AppState<S, C>>,
  Path(raw_id): Path<String>,
  AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  let content_id = parse_content_id(&raw_id)?;
  let item = state
    .store
    .get_content(content_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("content {content_id} not found")))?;
  let liked = state
    .store
    .has_user_liked(content_id, user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(LikeOutcome { liked, like_count: item.like_count }))
}
