//! Viewer identity: who an engagement event is attributed to.
//!
//! A view is attributed either to an authenticated user or to an anonymous
//! per-browser session token, never both and never neither. Likes always
//! require the `User` variant.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Longest session token accepted, in bytes.
pub const MAX_SESSION_TOKEN_LEN: usize = 128;

/// An opaque, client-persisted anonymous session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionToken(String);

impl SessionToken {
  /// Validate a raw token: non-empty, at most [`MAX_SESSION_TOKEN_LEN`]
  /// bytes, printable ASCII without whitespace.
  pub fn parse(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    if raw.is_empty() {
      return Err(Error::InvalidSessionToken("empty".into()));
    }
    if raw.len() > MAX_SESSION_TOKEN_LEN {
      return Err(Error::InvalidSessionToken(format!(
        "longer than {MAX_SESSION_TOKEN_LEN} bytes"
      )));
    }
    if !raw.bytes().all(|b| b.is_ascii_graphic()) {
      return Err(Error::InvalidSessionToken(
        "contains non-printable characters".into(),
      ));
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for SessionToken {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(raw) }
}

impl From<SessionToken> for String {
  fn from(token: SessionToken) -> Self { token.0 }
}

/// The actor a view is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ViewerIdentity {
  User(Uuid),
  Session(SessionToken),
}

impl ViewerIdentity {
  /// Pick an identity from what the request carried, preferring the
  /// authenticated user. Returns `None` when neither is present.
  pub fn resolve(
    user_id: Option<Uuid>,
    session: Option<SessionToken>,
  ) -> Option<Self> {
    match (user_id, session) {
      (Some(user), _) => Some(Self::User(user)),
      (None, Some(token)) => Some(Self::Session(token)),
      (None, None) => None,
    }
  }

  /// Normalised form used in the per-content uniqueness constraint.
  pub fn key(&self) -> String { self.to_string() }

  pub fn user_id(&self) -> Option<Uuid> {
    match self {
      Self::User(id) => Some(*id),
      Self::Session(_) => None,
    }
  }

  pub fn session(&self) -> Option<&SessionToken> {
    match self {
      Self::User(_) => None,
      Self::Session(token) => Some(token),
    }
  }
}

impl fmt::Display for ViewerIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::User(id) => write!(f, "user:{}", id.hyphenated()),
      Self::Session(token) => write!(f, "session:{}", token.as_str()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolve_prefers_user() {
    let user = Uuid::new_v4();
    let token = SessionToken::parse("abc").unwrap();
    assert_eq!(
      ViewerIdentity::resolve(Some(user), Some(token.clone())),
      Some(ViewerIdentity::User(user))
    );
    assert_eq!(
      ViewerIdentity::resolve(None, Some(token.clone())),
      Some(ViewerIdentity::Session(token))
    );
    assert_eq!(ViewerIdentity::resolve(None, None), None);
  }

  #[test]
  fn keys_do_not_collide_across_kinds() {
    let id = Uuid::new_v4();
    let as_user = ViewerIdentity::User(id);
    let as_session =
      ViewerIdentity::Session(SessionToken::parse(id.to_string()).unwrap());
    assert_ne!(as_user.key(), as_session.key());
    assert!(as_user.key().starts_with("user:"));
    assert!(as_session.key().starts_with("session:"));
  }

  #[test]
  fn session_token_validation() {
    assert!(SessionToken::parse("").is_err());
    assert!(SessionToken::parse("has space").is_err());
    assert!(SessionToken::parse("x".repeat(MAX_SESSION_TOKEN_LEN + 1)).is_err());
    assert!(SessionToken::parse("x".repeat(MAX_SESSION_TOKEN_LEN)).is_ok());
    assert!(SessionToken::parse("s-1f2e_3d").is_ok());
  }

  #[test]
  fn identity_serialises_as_tagged_union() {
    let token = SessionToken::parse("S1").unwrap();
    let json = serde_json::to_value(ViewerIdentity::Session(token)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "session", "id": "S1" }));

    let bad: Result<ViewerIdentity, _> =
      serde_json::from_value(serde_json::json!({ "kind": "session", "id": "" }));
    assert!(bad.is_err());
  }
}
