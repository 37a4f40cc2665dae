//! Handler for `GET /content/random`.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use tally_core::{content::ContentStatus, spotlight::SpotlightCache, store::EngagementStore};
use tally_spotlight::SpotlightPick;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Raw query parameters. Both are parsed by hand so a bad value gets the
/// JSON error body instead of axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RandomParams {
  pub category_id: Option<String>,
  pub status:      Option<String>,
}

impl RandomParams {
  /// An empty value is treated as absent.
  fn category(&self) -> Result<Option<Uuid>, ApiError> {
    match self.category_id.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(raw) => Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("invalid category_id: {raw}"))),
    }
  }

  fn status(&self) -> Result<ContentStatus, ApiError> {
    match self.status.as_deref().map(str::trim) {
      None | Some("") => Ok(ContentStatus::default()),
      Some(raw) => raw
        .parse()
        .map_err(|e: tally_core::Error| ApiError::BadRequest(e.to_string())),
    }
  }
}

/// `GET /content/random[?category_id=<uuid>][&status=<status>]`
pub async fn random<S, C>(
  State(state): State<AppState<S, C>>,
  params: Result<Query<RandomParams>, QueryRejection>,
) -> Result<Json<SpotlightPick>, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let category = params.category()?;
  let status = params.status()?;

  let pick = state
    .spotlight
    .get(category, status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(pick))
}
