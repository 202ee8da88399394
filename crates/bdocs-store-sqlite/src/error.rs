//! Error type for `bdocs-store-sqlite`.

use bdocs_core::InvalidInput;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] bdocs_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// Raised from inside a connection closure, where the raw `rusqlite`
  /// error is what we have.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value in database: {value:?}")]
  UnknownDiscriminant { column: &'static str, value: String },
}

impl From<InvalidInput> for Error {
  fn from(e: InvalidInput) -> Self { Self::Core(e.into()) }
}

impl Error {
  /// The domain error behind this one, if any.
  pub fn as_core(&self) -> Option<&bdocs_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
