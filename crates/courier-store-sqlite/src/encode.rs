//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. UUIDs are hyphenated lowercase strings.
//! Free-form fields (context snapshots, geojson, payloads, metadata) and the
//! outbox payload are compact JSON.

use std::{collections::BTreeMap, sync::LazyLock};

use chrono::{DateTime, Utc};
use courier_core::{
  context::{ContextSnapshot, TransitionSource, Trigger},
  lifecycle::ShipmentTransition,
  reactor::Invoice,
  scan::{ScanEvent, ScanType},
  shipment::{
    Bag, ExceptionDetails, ExceptionSeverity, ExceptionState, Location,
    LocationType, Milestones, Parcel, ReturnDetails, Shipment,
  },
  status::{Status, TimestampColumn},
};
use rusqlite::{Row, types::Value};
use serde_json::Value as Json;
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<Status> { Ok(s.parse()?) }

fn decode_trigger(s: &str) -> Result<Trigger> {
  match s {
    "manual" => Ok(Trigger::Manual),
    "scan_event" => Ok(Trigger::ScanEvent),
    "other" => Ok(Trigger::Other),
    other => Err(Error::Decode(format!("unknown trigger: {other:?}"))),
  }
}

// ─── Location ────────────────────────────────────────────────────────────────

pub fn encode_location(location: Option<Location>) -> (Value, Value) {
  match location {
    Some(l) => (
      Value::Text(l.kind.as_str().to_owned()),
      Value::Text(encode_uuid(l.id)),
    ),
    None => (Value::Null, Value::Null),
  }
}

fn decode_location(
  kind: Option<String>,
  id: Option<String>,
) -> Result<Option<Location>> {
  match (kind, id) {
    (Some(kind), Some(id)) => Ok(Some(Location {
      kind: kind.parse::<LocationType>()?,
      id:   decode_uuid(&id)?,
    })),
    _ => Ok(None),
  }
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

fn decode_opt_json(s: Option<String>) -> Result<Option<Json>> {
  s.as_deref().map(serde_json::from_str).transpose().map_err(Error::Json)
}

// ─── Value helpers ───────────────────────────────────────────────────────────

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

fn opt_text(s: Option<impl Into<String>>) -> Value {
  s.map_or(Value::Null, |s| Value::Text(s.into()))
}

fn opt_uuid(id: Option<Uuid>) -> Value { opt_text(id.map(encode_uuid)) }

fn opt_dt(dt: Option<DateTime<Utc>>) -> Value { opt_text(dt.map(encode_dt)) }

// ─── Shipments ───────────────────────────────────────────────────────────────

/// Every column of `shipments`, for `SELECT` lists.
pub static SHIPMENT_COLUMNS: LazyLock<String> = LazyLock::new(|| {
  let milestones = TimestampColumn::iter()
    .map(TimestampColumn::column_name)
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "shipment_id, tracking_number, awb_number, customer_id, current_status, \
     location_type, location_id, {milestones}, has_exception, exception_type, \
     exception_severity, exception_notes, exception_occurred_at, \
     return_reason, return_notes, last_scan_event_id, created_at, \
     updated_at, lock_version"
  )
});

/// The shipment's writable columns paired with their encoded values.
/// `lock_version` is left to the caller.
pub fn encode_shipment(s: &Shipment) -> Vec<(&'static str, Value)> {
  let (location_type, location_id) = encode_location(s.location);
  let details = s.exception.details.as_ref();

  let mut cols = vec![
    ("shipment_id", text(encode_uuid(s.shipment_id))),
    ("tracking_number", text(s.tracking_number.as_str())),
    ("awb_number", text(s.awb_number.as_str())),
    ("customer_id", opt_uuid(s.customer_id)),
    ("current_status", text(s.current_status.as_str())),
    ("status", text(s.status())),
    ("location_type", location_type),
    ("location_id", location_id),
  ];
  cols.extend(
    TimestampColumn::iter()
      .map(|c| (c.column_name(), opt_dt(s.milestones.get(c)))),
  );
  cols.extend([
    ("has_exception", Value::Integer(s.exception.has_exception.into())),
    ("exception_type", opt_text(details.map(|d| d.exception_type.as_str()))),
    ("exception_severity", opt_text(details.map(|d| d.severity.as_str()))),
    ("exception_notes", opt_text(details.and_then(|d| d.notes.as_deref()))),
    ("exception_occurred_at", opt_dt(s.exception.occurred_at)),
    (
      "return_reason",
      opt_text(s.return_details.as_ref().map(|r| r.reason.as_str())),
    ),
    (
      "return_notes",
      opt_text(s.return_details.as_ref().and_then(|r| r.notes.as_deref())),
    ),
    ("last_scan_event_id", opt_uuid(s.last_scan_event_id)),
    ("created_at", text(encode_dt(s.created_at))),
    ("updated_at", text(encode_dt(s.updated_at))),
  ]);
  cols
}

/// Raw strings read from a `shipments` row.
pub struct RawShipment {
  pub shipment_id:           String,
  pub tracking_number:       String,
  pub awb_number:            String,
  pub customer_id:           Option<String>,
  pub current_status:        String,
  pub location_type:         Option<String>,
  pub location_id:           Option<String>,
  pub milestones:            Vec<(TimestampColumn, Option<String>)>,
  pub has_exception:         bool,
  pub exception_type:        Option<String>,
  pub exception_severity:    Option<String>,
  pub exception_notes:       Option<String>,
  pub exception_occurred_at: Option<String>,
  pub return_reason:         Option<String>,
  pub return_notes:          Option<String>,
  pub last_scan_event_id:    Option<String>,
  pub created_at:            String,
  pub updated_at:            String,
  pub lock_version:          i64,
}

impl RawShipment {
  /// Read a row selected with [`SHIPMENT_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let milestones = TimestampColumn::iter()
      .map(|c| row.get::<_, Option<String>>(c.column_name()).map(|v| (c, v)))
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Self {
      shipment_id: row.get("shipment_id")?,
      tracking_number: row.get("tracking_number")?,
      awb_number: row.get("awb_number")?,
      customer_id: row.get("customer_id")?,
      current_status: row.get("current_status")?,
      location_type: row.get("location_type")?,
      location_id: row.get("location_id")?,
      milestones,
      has_exception: row.get("has_exception")?,
      exception_type: row.get("exception_type")?,
      exception_severity: row.get("exception_severity")?,
      exception_notes: row.get("exception_notes")?,
      exception_occurred_at: row.get("exception_occurred_at")?,
      return_reason: row.get("return_reason")?,
      return_notes: row.get("return_notes")?,
      last_scan_event_id: row.get("last_scan_event_id")?,
      created_at: row.get("created_at")?,
      updated_at: row.get("updated_at")?,
      lock_version: row.get("lock_version")?,
    })
  }

  pub fn into_shipment(self) -> Result<Shipment> {
    let mut milestones = Milestones::default();
    for (column, raw) in self.milestones {
      *milestones.slot_mut(column) = decode_opt_dt(raw)?;
    }

    let details = match self.exception_type {
      Some(exception_type) => Some(ExceptionDetails {
        exception_type,
        severity: self
          .exception_severity
          .as_deref()
          .map(str::parse::<ExceptionSeverity>)
          .transpose()?
          .unwrap_or_default(),
        notes: self.exception_notes,
      }),
      None => None,
    };

    Ok(Shipment {
      shipment_id: decode_uuid(&self.shipment_id)?,
      tracking_number: self.tracking_number,
      awb_number: self.awb_number,
      customer_id: decode_opt_uuid(self.customer_id)?,
      current_status: decode_status(&self.current_status)?,
      location: decode_location(self.location_type, self.location_id)?,
      milestones,
      exception: ExceptionState {
        has_exception: self.has_exception,
        details,
        occurred_at: decode_opt_dt(self.exception_occurred_at)?,
      },
      return_details: self
        .return_reason
        .map(|reason| ReturnDetails { reason, notes: self.return_notes }),
      last_scan_event_id: decode_opt_uuid(self.last_scan_event_id)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      lock_version: self.lock_version,
    })
  }
}

// ─── Transitions ─────────────────────────────────────────────────────────────

pub const TRANSITION_COLUMNS: &str = "transition_id, shipment_id, from_status, \
  to_status, trigger_kind, source_type, source_id, performed_by, forced, \
  context, recorded_at";

pub fn encode_transition(t: &ShipmentTransition) -> Result<Vec<Value>> {
  Ok(vec![
    text(encode_uuid(t.transition_id)),
    text(encode_uuid(t.shipment_id)),
    opt_text(t.from_status.map(Status::as_str)),
    text(t.to_status.as_str()),
    text(t.trigger.as_str()),
    text(t.source.source_type()),
    opt_uuid(t.source.source_id()),
    opt_uuid(t.performed_by),
    Value::Integer(t.forced.into()),
    text(encode_json(&t.context)?),
    text(encode_dt(t.recorded_at)),
  ])
}

/// Raw strings read from a `shipment_transitions` row.
pub struct RawTransition {
  pub transition_id: String,
  pub shipment_id:   String,
  pub from_status:   Option<String>,
  pub to_status:     String,
  pub trigger_kind:  String,
  pub source_type:   String,
  pub source_id:     Option<String>,
  pub performed_by:  Option<String>,
  pub forced:        bool,
  pub context:       String,
  pub recorded_at:   String,
}

impl RawTransition {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transition_id: row.get(0)?,
      shipment_id:   row.get(1)?,
      from_status:   row.get(2)?,
      to_status:     row.get(3)?,
      trigger_kind:  row.get(4)?,
      source_type:   row.get(5)?,
      source_id:     row.get(6)?,
      performed_by:  row.get(7)?,
      forced:        row.get(8)?,
      context:       row.get(9)?,
      recorded_at:   row.get(10)?,
    })
  }

  pub fn into_transition(self) -> Result<ShipmentTransition> {
    let source_id = decode_opt_uuid(self.source_id)?;
    let source = TransitionSource::from_parts(&self.source_type, source_id)
      .ok_or_else(|| {
        Error::Decode(format!("bad transition source: {:?}", self.source_type))
      })?;
    let context: ContextSnapshot = serde_json::from_str(&self.context)?;

    Ok(ShipmentTransition {
      transition_id: decode_uuid(&self.transition_id)?,
      shipment_id: decode_uuid(&self.shipment_id)?,
      from_status: self.from_status.as_deref().map(decode_status).transpose()?,
      to_status: decode_status(&self.to_status)?,
      trigger: decode_trigger(&self.trigger_kind)?,
      source,
      performed_by: decode_opt_uuid(self.performed_by)?,
      forced: self.forced,
      context,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

// ─── Scan events ─────────────────────────────────────────────────────────────

pub const SCAN_COLUMNS: &str = "scan_event_id, scan_type, shipment_id, bag_id, \
  route_id, stop_id, leg_id, branch_id, user_id, location_type, location_id, \
  occurred_at, geojson, note, payload, metadata, status_after, recorded_at";

pub fn encode_scan_event(e: &ScanEvent) -> Result<Vec<Value>> {
  let (location_type, location_id) = encode_location(e.location);
  Ok(vec![
    text(encode_uuid(e.scan_event_id)),
    text(e.scan_type.as_str()),
    opt_uuid(e.shipment_id),
    opt_uuid(e.bag_id),
    opt_uuid(e.route_id),
    opt_uuid(e.stop_id),
    opt_uuid(e.leg_id),
    opt_uuid(e.branch_id),
    opt_uuid(e.user_id),
    location_type,
    location_id,
    text(encode_dt(e.occurred_at)),
    opt_text(e.geojson.as_ref().map(encode_json).transpose()?),
    opt_text(e.note.as_deref()),
    opt_text(e.payload.as_ref().map(encode_json).transpose()?),
    text(encode_json(&e.metadata)?),
    opt_text(e.status_after.map(Status::as_str)),
    text(encode_dt(e.recorded_at)),
  ])
}

/// Raw strings read from a `scan_events` row.
pub struct RawScanEvent {
  pub scan_event_id: String,
  pub scan_type:     String,
  pub shipment_id:   Option<String>,
  pub bag_id:        Option<String>,
  pub route_id:      Option<String>,
  pub stop_id:       Option<String>,
  pub leg_id:        Option<String>,
  pub branch_id:     Option<String>,
  pub user_id:       Option<String>,
  pub location_type: Option<String>,
  pub location_id:   Option<String>,
  pub occurred_at:   String,
  pub geojson:       Option<String>,
  pub note:          Option<String>,
  pub payload:       Option<String>,
  pub metadata:      String,
  pub status_after:  Option<String>,
  pub recorded_at:   String,
}

impl RawScanEvent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      scan_event_id: row.get(0)?,
      scan_type:     row.get(1)?,
      shipment_id:   row.get(2)?,
      bag_id:        row.get(3)?,
      route_id:      row.get(4)?,
      stop_id:       row.get(5)?,
      leg_id:        row.get(6)?,
      branch_id:     row.get(7)?,
      user_id:       row.get(8)?,
      location_type: row.get(9)?,
      location_id:   row.get(10)?,
      occurred_at:   row.get(11)?,
      geojson:       row.get(12)?,
      note:          row.get(13)?,
      payload:       row.get(14)?,
      metadata:      row.get(15)?,
      status_after:  row.get(16)?,
      recorded_at:   row.get(17)?,
    })
  }

  pub fn into_scan_event(self) -> Result<ScanEvent> {
    let metadata: BTreeMap<String, Json> = serde_json::from_str(&self.metadata)?;
    Ok(ScanEvent {
      scan_event_id: decode_uuid(&self.scan_event_id)?,
      scan_type: self.scan_type.parse::<ScanType>()?,
      shipment_id: decode_opt_uuid(self.shipment_id)?,
      bag_id: decode_opt_uuid(self.bag_id)?,
      route_id: decode_opt_uuid(self.route_id)?,
      stop_id: decode_opt_uuid(self.stop_id)?,
      leg_id: decode_opt_uuid(self.leg_id)?,
      branch_id: decode_opt_uuid(self.branch_id)?,
      user_id: decode_opt_uuid(self.user_id)?,
      location: decode_location(self.location_type, self.location_id)?,
      occurred_at: decode_dt(&self.occurred_at)?,
      geojson: decode_opt_json(self.geojson)?,
      note: self.note,
      payload: decode_opt_json(self.payload)?,
      metadata,
      status_after: self.status_after.as_deref().map(decode_status).transpose()?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

// ─── Parcels, bags, invoices ─────────────────────────────────────────────────

pub struct RawParcel {
  pub parcel_id:   String,
  pub shipment_id: String,
  pub sscc:        String,
  pub created_at:  String,
}

impl RawParcel {
  pub fn into_parcel(self) -> Result<Parcel> {
    Ok(Parcel {
      parcel_id:   decode_uuid(&self.parcel_id)?,
      shipment_id: decode_uuid(&self.shipment_id)?,
      sscc:        self.sscc,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawBag {
  pub bag_id:     String,
  pub code:       String,
  pub created_at: String,
}

impl RawBag {
  pub fn into_bag(self) -> Result<Bag> {
    Ok(Bag {
      bag_id:     decode_uuid(&self.bag_id)?,
      code:       self.code,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawInvoice {
  pub invoice_id:     String,
  pub shipment_id:    String,
  pub invoice_number: String,
  pub issued_at:      String,
}

impl RawInvoice {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invoice_id:     row.get(0)?,
      shipment_id:    row.get(1)?,
      invoice_number: row.get(2)?,
      issued_at:      row.get(3)?,
    })
  }

  pub fn into_invoice(self) -> Result<Invoice> {
    Ok(Invoice {
      invoice_id:     decode_uuid(&self.invoice_id)?,
      shipment_id:    decode_uuid(&self.shipment_id)?,
      invoice_number: self.invoice_number,
      issued_at:      decode_dt(&self.issued_at)?,
    })
  }
}
