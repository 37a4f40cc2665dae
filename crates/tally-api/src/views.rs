//! Handler for `POST /content/{id}/view`.
//!
//! The write runs in a spawned task so a client that hangs up mid-request
//! cannot cancel an in-flight transaction. On a storage failure the handler
//! still answers with the last-known counter, flagged as not counted.

use axum::{
  Json,
  extract::{Path, State},
  http::HeaderMap,
  response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::{
  ErrorKind,
  engagement::ViewMeta,
  spotlight::SpotlightCache,
  store::EngagementStore,
};

use crate::{
  AppState,
  error::{ApiError, kind_status},
  identity::Viewer,
  parse_content_id,
};

/// Longest user agent kept on a view fact.
const MAX_USER_AGENT_LEN: usize = 512;

fn view_meta(headers: &HeaderMap) -> ViewMeta {
  let text = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|s| !s.is_empty())
  };

  // First hop of x-forwarded-for is the original client.
  let ip_address = text("x-forwarded-for")
    .and_then(|v| v.split(',').next())
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty());

  let user_agent = text("user-agent").map(|ua| {
    let mut end = ua.len().min(MAX_USER_AGENT_LEN);
    while !ua.is_char_boundary(end) {
      end -= 1;
    }
    ua[..end].to_owned()
  });

  ViewMeta { ip_address, user_agent }
}

/// `POST /content/{id}/view`
pub async fn record<S, C>(
  State(state): State<AppState<S, C>>,
  Path(raw_id): Path<String>,
  Viewer(viewer): Viewer,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: EngagementStore + 'static,
  C: SpotlightCache + 'static,
{
  let content_id = parse_content_id(&raw_id)?;
  let meta = view_meta(&headers);

  let store = state.store.clone();
  let result = tokio::spawn(async move {
    store.record_view(content_id, viewer, meta).await
  })
  .await?;

  let err = match result {
    Ok(outcome) => return Ok(Json(outcome).into_response()),
    Err(e) => ApiError::store(e),
  };

  let kind = match err.store_kind() {
    Some(kind @ (ErrorKind::Transient | ErrorKind::Storage)) => kind,
    _ => return Err(err),
  };

  // Soft failure: report the view as uncounted with whatever count we can
  // still read. If the read fails too, fall back to the plain error.
  let view_count = match state.store.get_content(content_id).await {
    Ok(Some(item)) => item.view_count,
    Ok(None) => return Err(ApiError::NotFound(format!("content {content_id} not found"))),
    Err(read_err) => {
      tracing::warn!(%content_id, error = %read_err, "could not read last-known view count");
      return Err(err);
    }
  };

  tracing::warn!(%content_id, error = %err, "view not recorded");
  let body = json!({
    "counted": false,
    "viewCount": view_count,
    "error": err.body(),
  });
  Ok((kind_status(kind), Json(body)).into_response())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn meta_takes_first_forwarded_hop() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
    headers.insert("user-agent", "curl/8.0".parse().unwrap());
    let meta = view_meta(&headers);
    assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
  }

  #[test]
  fn meta_is_empty_without_headers() {
    let meta = view_meta(&HeaderMap::new());
    assert!(meta.ip_address.is_none());
    assert!(meta.user_agent.is_none());
  }

  #[test]
  fn long_user_agent_is_truncated() {
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", "a".repeat(2000).parse().unwrap());
    let meta = view_meta(&headers);
    assert_eq!(meta.user_agent.unwrap().len(), MAX_USER_AGENT_LEN);
  }
}
