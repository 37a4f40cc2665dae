//! Error type for `tally-store-sqlite`.

use rusqlite::ErrorCode;
use tally_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("content not found: {0}")]
  ContentNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Lock contention and busy-database failures; worth one more attempt.
  pub fn is_transient(&self) -> bool {
    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => {
        matches!(
          e.sqlite_error_code(),
          Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
      }
      _ => false,
    }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::ContentNotFound(_) => ErrorKind::NotFound,
      e if e.is_transient() => ErrorKind::Transient,
      _ => ErrorKind::Storage,
    }
  }
}

/// True only for `UNIQUE` violations, which the writers reinterpret as
/// "another request already applied this". Other constraint failures
/// (`CHECK`, `FOREIGN KEY`, `NOT NULL`) are real errors.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}
