//! Error types for `tally-core`, plus the stable classification every
//! backend error maps onto.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("content not found: {0}")]
  ContentNotFound(Uuid),

  #[error("invalid session token: {0}")]
  InvalidSessionToken(String),

  #[error("unknown content status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// The coarse category of a failure, independent of the backend that raised
/// it. The HTTP layer maps each kind onto a status code and a stable error
/// code; raw backend messages never reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The referenced content item does not exist.
  NotFound,
  /// The request was rejected before any transaction began.
  InvalidInput,
  /// A retryable storage failure (lock contention, busy database) that
  /// persisted through the internal retry.
  Transient,
  /// Any other storage failure.
  Storage,
}

impl ErrorKind {
  /// Machine-readable code included in error responses.
  pub fn code(self) -> &'static str {
    match self {
      Self::NotFound => "not_found",
      Self::InvalidInput => "invalid_input",
      Self::Transient => "storage_unavailable",
      Self::Storage => "storage_error",
    }
  }
}

/// Implemented by every error type that can cross the store boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::ContentNotFound(_) => ErrorKind::NotFound,
      Error::InvalidSessionToken(_) | Error::UnknownStatus(_) => {
        ErrorKind::InvalidInput
      }
    }
  }
}
