//! Handler for `POST /scans`.
//!
//! The body is a free-form scan attribute bag (see
//! [`courier_core::scan::ScanAttributes`]). Returns 201 and the stored scan
//! event; `status_after` is set when the scan moved its shipment.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use courier_core::{engine::LifecycleEngine, scan::ScanAttributes, store::ShipmentStore};

use crate::{actor::Actor, error::ApiError};

/// `POST /scans`
pub async fn record<S: ShipmentStore>(
  State(engine): State<Arc<LifecycleEngine<S>>>,
  Actor(actor): Actor,
  Json(attrs): Json<ScanAttributes>,
) -> Result<impl IntoResponse, ApiError> {
  let scan = engine.record(attrs, actor).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(scan)))
}
