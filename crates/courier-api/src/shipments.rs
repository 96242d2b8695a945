//! Handlers for `/shipments`, `/tracking` and `/bags` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/shipments` | Body: [`NewShipment`]; returns 201 |
//! | `GET`  | `/shipments/{id}` | 404 if not found |
//! | `GET`  | `/tracking/{tracking_number}` | 404 if not found |
//! | `GET`  | `/shipments/{id}/transitions` | Oldest first |
//! | `GET`  | `/shipments/{id}/scans` | Oldest first |
//! | `GET`  | `/shipments/{id}/allowed` | Statuses reachable in one step |
//! | `POST` | `/shipments/{id}/transition` | Body: [`TransitionBody`] |
//! | `POST` | `/shipments/{id}/resolve-exception` | Clears exception state |
//! | `POST` | `/shipments/{id}/parcels` | Body: `{"sscc":"..."}` |
//! | `POST` | `/bags` | Body: `{"code":"..."}` |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use courier_core::{
  context::{TransitionContext, Trigger},
  engine::LifecycleEngine,
  lifecycle::ShipmentTransition,
  scan::ScanEvent,
  shipment::{
    ExceptionDetails, ExceptionSeverity, Location, NewShipment, ReturnDetails,
    Shipment,
  },
  status::Status,
  store::ShipmentStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{actor::Actor, error::ApiError};

type Engine<S> = State<Arc<LifecycleEngine<S>>>;

async fn load<S: ShipmentStore>(
  engine: &LifecycleEngine<S>,
  id: Uuid,
) -> Result<Shipment, ApiError> {
  engine
    .store()
    .get_shipment(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("shipment {id} not found")))
}

// ─── Book ────────────────────────────────────────────────────────────────────

/// `POST /shipments`
pub async fn create<S: ShipmentStore>(
  State(engine): Engine<S>,
  Actor(actor): Actor,
  Json(body): Json<NewShipment>,
) -> Result<impl IntoResponse, ApiError> {
  let shipment = engine.book(body, actor).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(shipment)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /shipments/{id}`
pub async fn get_one<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, ApiError> {
  Ok(Json(load(&engine, id).await?))
}

/// `GET /tracking/{tracking_number}`
pub async fn by_tracking_number<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(tracking_number): Path<String>,
) -> Result<Json<Shipment>, ApiError> {
  let shipment = engine
    .store()
    .find_by_tracking_number(&tracking_number)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("tracking number {tracking_number:?} not found")))?;
  Ok(Json(shipment))
}

/// `GET /shipments/{id}/transitions`
pub async fn transitions<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ShipmentTransition>>, ApiError> {
  load(&engine, id).await?;
  let history = engine
    .store()
    .transitions(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(history))
}

/// `GET /shipments/{id}/scans`
pub async fn scans<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScanEvent>>, ApiError> {
  load(&engine, id).await?;
  let scans = engine
    .store()
    .scan_events(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(scans))
}

#[derive(Debug, Serialize)]
pub struct AllowedResponse {
  pub current_status: Status,
  pub allowed:        &'static [Status],
}

/// `GET /shipments/{id}/allowed`
pub async fn allowed<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<AllowedResponse>, ApiError> {
  let shipment = load(&engine, id).await?;
  Ok(Json(AllowedResponse {
    current_status: shipment.current_status,
    allowed:        LifecycleEngine::<S>::allowed_next_statuses(Some(
      shipment.current_status,
    )),
  }))
}

// ─── Manual transition ───────────────────────────────────────────────────────

/// Body of a manual transition: the target status plus the recognized
/// context options, flat.
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub status:              String,
  #[serde(default)]
  pub force:               bool,
  /// Overrides the `x-actor-id` header.
  pub performed_by:        Option<Uuid>,
  pub timestamp:           Option<DateTime<Utc>>,
  pub location:            Option<Location>,
  pub exception_type:      Option<String>,
  pub exception_severity:  Option<String>,
  pub exception_notes:     Option<String>,
  pub return_reason:       Option<String>,
  pub return_notes:        Option<String>,
  #[serde(default)]
  pub overwrite_timestamp: bool,
  #[serde(default)]
  pub metadata:            BTreeMap<String, Value>,
}

impl TransitionBody {
  fn into_parts(
    self,
    actor: Option<Uuid>,
  ) -> Result<(Status, TransitionContext), courier_core::Error> {
    let target: Status = self.status.parse()?;
    let severity = self
      .exception_severity
      .as_deref()
      .map(str::parse::<ExceptionSeverity>)
      .transpose()?
      .unwrap_or_default();

    let ctx = TransitionContext {
      force: self.force,
      performed_by: self.performed_by.or(actor),
      timestamp: self.timestamp,
      location: self.location,
      scan_event: None,
      exception: self.exception_type.map(|exception_type| ExceptionDetails {
        exception_type,
        severity,
        notes: self.exception_notes,
      }),
      return_details: self
        .return_reason
        .map(|reason| ReturnDetails { reason, notes: self.return_notes }),
      overwrite_timestamp: self.overwrite_timestamp,
      trigger: Some(Trigger::Manual),
      source: None,
      metadata: self.metadata,
    };
    Ok((target, ctx))
  }
}

/// `POST /shipments/{id}/transition`
pub async fn transition<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  Actor(actor): Actor,
  Json(body): Json<TransitionBody>,
) -> Result<Json<ShipmentTransition>, ApiError> {
  let (target, ctx) = body.into_parts(actor)?;
  let record = engine
    .transition(id, target, ctx)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

/// `POST /shipments/{id}/resolve-exception`
pub async fn resolve_exception<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, ApiError> {
  let shipment = engine
    .resolve_exception(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(shipment))
}

// ─── Parcels & bags ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ParcelBody {
  pub sscc: String,
}

/// `POST /shipments/{id}/parcels`
pub async fn add_parcel<S: ShipmentStore>(
  State(engine): Engine<S>,
  Path(id): Path<Uuid>,
  Json(body): Json<ParcelBody>,
) -> Result<impl IntoResponse, ApiError> {
  let parcel = engine
    .store()
    .register_parcel(id, body.sscc)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(parcel)))
}

#[derive(Debug, Deserialize)]
pub struct BagBody {
  pub code: String,
}

/// `POST /bags`
pub async fn create_bag<S: ShipmentStore>(
  State(engine): Engine<S>,
  Json(body): Json<BagBody>,
) -> Result<impl IntoResponse, ApiError> {
  let bag = engine
    .store()
    .register_bag(body.code)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(bag)))
}
