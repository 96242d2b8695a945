//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use courier_core::AsCoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Well-formed input the domain rejects: unknown status or scan type,
  /// missing exception details.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  /// Illegal transition, concurrent write, or duplicate identifier.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store (or core) error by its core cause.
  pub fn from_store<E>(err: E) -> Self
  where
    E: std::error::Error + AsCoreError + Send + Sync + 'static,
  {
    use courier_core::Error as Core;

    let message = err.as_core().map_or_else(|| err.to_string(), Core::to_string);
    if err.is_not_found() {
      return ApiError::NotFound(message);
    }
    if err.is_conflict() {
      return ApiError::Conflict(message);
    }
    match err.as_core() {
      Some(Core::IllegalTransition { .. }) => ApiError::Conflict(message),
      Some(
        Core::UnknownStatus(_)
        | Core::UnknownScanType(_)
        | Core::InvalidArgument(_)
        | Core::MissingExceptionDetails,
      ) => ApiError::Unprocessable(message),
      _ => ApiError::Store(Box::new(err)),
    }
  }
}

impl From<courier_core::Error> for ApiError {
  fn from(err: courier_core::Error) -> Self { Self::from_store(err) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
