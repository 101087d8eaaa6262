//! Error types for `racetrack-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed registration input; correctable by the caller.
  #[error("invalid registration: {0}")]
  Validation(String),

  #[error("rfid tag {0:?} is already registered")]
  DuplicateTag(String),

  #[error("no participant registered for tag {0:?}")]
  TagNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse classification shared by every backend error type.
///
/// Registration maps these onto caller-facing outcomes; ingestion uses them
/// to decide between retrying and dropping a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  Conflict,
  NotFound,
  /// Environment-level failure. `transient` is set when the store reported
  /// contention (e.g. a busy lock) and the same call may succeed on retry.
  Storage { transient: bool },
}

impl ErrorKind {
  pub fn is_transient(self) -> bool {
    matches!(self, Self::Storage { transient: true })
  }
}

/// Implemented by backend error types so higher layers can classify failures
/// without knowing the concrete backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::DuplicateTag(_) => ErrorKind::Conflict,
      Self::TagNotFound(_) => ErrorKind::NotFound,
    }
  }
}
