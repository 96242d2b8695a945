//! Error type for `courier-store-sqlite`.

use courier_core::AsCoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] courier_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt row: {0}")]
  Decode(String),

  /// The shipment's `lock_version` moved between read and write.
  #[error("shipment {0} was modified concurrently")]
  Conflict(uuid::Uuid),

  /// A unique column already holds this value.
  #[error("{what} {value:?} already exists")]
  Duplicate { what: &'static str, value: String },
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&courier_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }

  fn is_conflict(&self) -> bool {
    matches!(self, Error::Conflict(_) | Error::Duplicate { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Turn a UNIQUE violation into [`Error::Duplicate`]; pass anything else
/// through.
pub(crate) fn unique_violation(
  err: rusqlite::Error,
  what: &'static str,
  value: &str,
) -> Error {
  match &err {
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      Error::Duplicate { what, value: value.to_owned() }
    }
    _ => Error::Sqlite(err),
  }
}
