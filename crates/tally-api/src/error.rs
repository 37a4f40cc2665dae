//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"error": {"code": ..., "message": ...}}`
//! where `code` is one of the stable [`ErrorKind`] codes. Storage errors are
//! logged in full and replaced by a generic message.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tally_core::{Classify, ErrorKind};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("authentication required")]
  Unauthorized,

  #[error("store error: {source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("engagement task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl ApiError {
  /// Wrap a backend error, keeping its classification.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    ApiError::Store { kind: e.kind(), source: Box::new(e) }
  }

  /// The backend classification, for store errors.
  pub fn store_kind(&self) -> Option<ErrorKind> {
    match self {
      ApiError::Store { kind, .. } => Some(*kind),
      _ => None,
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Store { kind, .. } => kind_status(*kind),
      ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// The `{"code", "message"}` object placed under `"error"`.
  pub fn body(&self) -> Value {
    let (code, message) = match self {
      ApiError::NotFound(m) => (ErrorKind::NotFound.code(), m.clone()),
      ApiError::BadRequest(m) => (ErrorKind::InvalidInput.code(), m.clone()),
      ApiError::Unauthorized => ("unauthorized", self.to_string()),
      ApiError::Store { kind, .. } => (kind.code(), kind_message(*kind).to_owned()),
      ApiError::Task(_) => (
        ErrorKind::Storage.code(),
        kind_message(ErrorKind::Storage).to_owned(),
      ),
    };
    json!({ "code": code, "message": message })
  }

  fn log(&self) {
    match self {
      ApiError::Store { kind: ErrorKind::Transient | ErrorKind::Storage, source } => {
        tracing::error!(error = %source, "storage failure");
      }
      ApiError::Task(e) => tracing::error!(error = %e, "engagement task failed"),
      _ => {}
    }
  }
}

pub(crate) fn kind_status(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
    ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn kind_message(kind: ErrorKind) -> &'static str {
  match kind {
    ErrorKind::NotFound => "content not found",
    ErrorKind::InvalidInput => "invalid request",
    ErrorKind::Transient => "storage temporarily unavailable, try again",
    ErrorKind::Storage => "internal storage error",
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    self.log();
    (self.status(), Json(json!({ "error": self.body() }))).into_response()
  }
}
