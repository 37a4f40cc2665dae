//! Caller identity extractors.
//!
//! Authentication happens upstream: the auth middleware verifies the
//! caller's token and forwards the user id in `x-user-id`. Anonymous
//! browsers send their persisted session token in `x-session-id`.

use axum::{extract::FromRequestParts, http::request::Parts};
use tally_core::identity::{SessionToken, ViewerIdentity};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
  parts
    .headers
    .get(name)
    .map(|v| {
      v.to_str()
        .map_err(|_| ApiError::BadRequest(format!("{name} is not valid ASCII")))
    })
    .transpose()
}

fn user_id(parts: &Parts) -> Result<Option<Uuid>, ApiError> {
  header(parts, USER_ID_HEADER)?
    .map(|raw| {
      Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("{USER_ID_HEADER} is not a UUID")))
    })
    .transpose()
}

/// The identity a view is attributed to, if the request carried one.
/// Prefers the authenticated user over the session token.
pub struct Viewer(pub Option<ViewerIdentity>);

impl<S> FromRequestParts<S> for Viewer
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let user = user_id(parts)?;
    let session = match (user, header(parts, SESSION_ID_HEADER)?) {
      // An authenticated caller wins; ignore whatever token came along.
      (Some(_), _) | (None, None) => None,
      (None, Some(raw)) => Some(
        SessionToken::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?,
      ),
    };
    Ok(Viewer(ViewerIdentity::resolve(user, session)))
  }
}

/// An authenticated user id. Rejects with 401 when absent.
pub struct AuthenticatedUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    user_id(parts)?.map(AuthenticatedUser).ok_or(ApiError::Unauthorized)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;

  use super::*;

  async fn viewer(headers: &[(&str, &str)]) -> Result<Viewer, ApiError> {
    let mut builder = Request::builder();
    for (k, v) in headers {
      builder = builder.header(*k, *v);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    Viewer::from_request_parts(&mut parts, &()).await
  }

  #[tokio::test]
  async fn user_header_wins_over_session() {
    let id = Uuid::new_v4();
    let raw = id.to_string();
    let Viewer(identity) = viewer(&[
      (USER_ID_HEADER, raw.as_str()),
      (SESSION_ID_HEADER, "S1"),
    ])
    .await
    .unwrap();
    assert_eq!(identity, Some(ViewerIdentity::User(id)));
  }

  #[tokio::test]
  async fn session_header_alone() {
    let Viewer(identity) = viewer(&[(SESSION_ID_HEADER, "S1")]).await.unwrap();
    assert_eq!(
      identity,
      Some(ViewerIdentity::Session(SessionToken::parse("S1").unwrap()))
    );
  }

  #[tokio::test]
  async fn no_headers_means_no_identity() {
    let Viewer(identity) = viewer(&[]).await.unwrap();
    assert!(identity.is_none());
  }

  #[tokio::test]
  async fn malformed_user_id_is_rejected() {
    let err = viewer(&[(USER_ID_HEADER, "not-a-uuid")]).await.err().unwrap();
    assert!(matches!(err, ApiError::BadRequest(_)));
  }

  #[tokio::test]
  async fn missing_user_is_unauthorized() {
    let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
    let err = AuthenticatedUser::from_request_parts(&mut parts, &())
      .await
      .err()
      .unwrap();
    assert!(matches!(err, ApiError::Unauthorized));
  }
}
