//! Error type for `racetrack-store-sqlite`.

use racetrack_core::{ErrorKind, StoreError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] racetrack_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => ErrorKind::Storage {
        transient: matches!(
          e.sqlite_error_code(),
          Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        ),
      },
      Error::Database(_) | Error::DateParse(_) => {
        ErrorKind::Storage { transient: false }
      }
    }
  }
}
