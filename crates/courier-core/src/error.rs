//! Error types for `courier-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::status::Status;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown scan type: {0:?}")]
  UnknownScanType(String),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  /// The move is not in the transition table and `force` was not set.
  /// `from` is `None` only for a shipment that does not exist yet.
  #[error("illegal transition: {} -> {to}", .from.map_or("NONE", Status::as_str))]
  IllegalTransition { from: Option<Status>, to: Status },

  #[error("a transition into EXCEPTION requires an exception type")]
  MissingExceptionDetails,

  #[error("shipment not found: {0}")]
  ShipmentNotFound(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Lets layers above a storage backend recover the core cause of a backend
/// error without knowing the backend's concrete error type.
pub trait AsCoreError {
  fn as_core(&self) -> Option<&Error>;

  /// `true` when the error is a not-found condition of any kind.
  fn is_not_found(&self) -> bool {
    matches!(self.as_core(), Some(Error::ShipmentNotFound(_)))
  }

  /// `true` when a concurrent writer won the race for the same shipment.
  fn is_conflict(&self) -> bool { false }
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&Error> { Some(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
