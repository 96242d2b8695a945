//! Scan events — point-in-time observations from handheld and mobile
//! devices — and the validation that turns a raw submission into something
//! a store can ingest.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{EnumIter, IntoEnumIterator as _, IntoStaticStr};
use uuid::Uuid;

use crate::{
  Error, Result,
  context::{TransitionContext, Trigger},
  shipment::{ExceptionDetails, ExceptionSeverity, Location, ReturnDetails},
  status::Status,
};

// ─── Scan type ───────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScanType {
  PickupScheduled,
  PickedUp,
  OriginHubIn,
  Bagged,
  LinehaulDeparted,
  LinehaulArrived,
  DestinationHubIn,
  CustomsHold,
  CustomsCleared,
  OutForDelivery,
  Delivered,
  DeliveryFailed,
  ReturnInitiated,
  ReturnInTransit,
  Returned,
  Checkpoint,
  BagSealed,
  BagOpened,
  RouteStopArrived,
}

impl ScanType {
  pub fn as_str(self) -> &'static str { self.into() }

  /// The status a shipment moves to when this scan is applied, if the scan
  /// implies one.
  pub fn resulting_status(self) -> Option<Status> {
    Some(match self {
      Self::PickupScheduled => Status::PickupScheduled,
      Self::PickedUp => Status::PickedUp,
      Self::OriginHubIn => Status::AtOriginHub,
      Self::Bagged => Status::Bagged,
      Self::LinehaulDeparted => Status::LinehaulDeparted,
      Self::LinehaulArrived => Status::LinehaulArrived,
      Self::DestinationHubIn => Status::AtDestinationHub,
      Self::CustomsHold => Status::CustomsHold,
      Self::CustomsCleared => Status::CustomsCleared,
      Self::OutForDelivery => Status::OutForDelivery,
      Self::Delivered => Status::Delivered,
      Self::DeliveryFailed => Status::Exception,
      Self::ReturnInitiated => Status::ReturnInitiated,
      Self::ReturnInTransit => Status::ReturnInTransit,
      Self::Returned => Status::Returned,
      Self::Checkpoint
      | Self::BagSealed
      | Self::BagOpened
      | Self::RouteStopArrived => return None,
    })
  }
}

impl fmt::Display for ScanType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ScanType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::iter()
      .find(|t| t.as_str() == s)
      .ok_or_else(|| Error::UnknownScanType(s.to_owned()))
  }
}

// ─── Raw submission ──────────────────────────────────────────────────────────

/// A scan as submitted by a device, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanAttributes {
  #[serde(rename = "type")]
  pub scan_type:          String,
  pub shipment_id:        Option<Uuid>,
  pub tracking_number:    Option<String>,
  /// Resolves the shipment through its parcel.
  pub sscc:               Option<String>,
  pub bag_id:             Option<Uuid>,
  pub bag_code:           Option<String>,
  pub route_id:           Option<Uuid>,
  pub stop_id:            Option<Uuid>,
  pub leg_id:             Option<Uuid>,
  pub branch_id:          Option<Uuid>,
  pub user_id:            Option<Uuid>,
  pub location:           Option<Location>,
  pub occurred_at:        Option<DateTime<Utc>>,
  /// Explicit override of the status the scan implies.
  pub status_after:       Option<String>,
  pub exception_type:     Option<String>,
  pub exception_severity: Option<String>,
  pub return_reason:      Option<String>,
  pub geojson:            Option<Value>,
  pub note:               Option<String>,
  pub payload:            Option<Value>,
  #[serde(default)]
  pub metadata:           BTreeMap<String, Value>,
}

impl ScanAttributes {
  pub fn new(scan_type: impl Into<String>) -> Self {
    Self { scan_type: scan_type.into(), ..Self::default() }
  }
}

// ─── Validated submission ────────────────────────────────────────────────────

/// How a scan identifies its shipment, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentLookup {
  pub shipment_id:     Option<Uuid>,
  pub tracking_number: Option<String>,
  pub sscc:            Option<String>,
}

/// How a scan identifies its bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BagLookup {
  pub bag_id: Option<Uuid>,
  pub code:   Option<String>,
}

/// A scan whose type, explicit status and severity have been validated.
/// Building one performs no I/O, so a rejected scan has no side effects.
#[derive(Debug, Clone)]
pub struct ScanSubmission {
  pub scan_type:          ScanType,
  pub shipment:           ShipmentLookup,
  pub bag:                BagLookup,
  pub route_id:           Option<Uuid>,
  pub stop_id:            Option<Uuid>,
  pub leg_id:             Option<Uuid>,
  pub branch_id:          Option<Uuid>,
  pub user_id:            Option<Uuid>,
  pub location:           Option<Location>,
  pub occurred_at:        DateTime<Utc>,
  pub status_after:       Option<Status>,
  pub exception_type:     Option<String>,
  pub exception_severity: Option<ExceptionSeverity>,
  pub return_reason:      Option<String>,
  pub geojson:            Option<Value>,
  pub note:               Option<String>,
  pub payload:            Option<Value>,
  pub metadata:           BTreeMap<String, Value>,
}

impl ScanSubmission {
  /// Validate `attrs`. `actor` is the ambient request identity, used when the
  /// scan names no user of its own.
  pub fn parse(
    attrs: ScanAttributes,
    actor: Option<Uuid>,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    let scan_type: ScanType = attrs.scan_type.parse()?;
    let status_after = attrs
      .status_after
      .as_deref()
      .map(str::parse::<Status>)
      .transpose()?;
    let exception_severity = attrs
      .exception_severity
      .as_deref()
      .map(str::parse::<ExceptionSeverity>)
      .transpose()?;

    Ok(Self {
      scan_type,
      shipment: ShipmentLookup {
        shipment_id:     attrs.shipment_id,
        tracking_number: attrs.tracking_number,
        sscc:            attrs.sscc,
      },
      bag: BagLookup { bag_id: attrs.bag_id, code: attrs.bag_code },
      route_id: attrs.route_id,
      stop_id: attrs.stop_id,
      leg_id: attrs.leg_id,
      branch_id: attrs.branch_id,
      user_id: attrs.user_id.or(actor),
      location: attrs.location,
      occurred_at: attrs.occurred_at.unwrap_or(now),
      status_after,
      exception_type: attrs.exception_type,
      exception_severity,
      return_reason: attrs.return_reason,
      geojson: attrs.geojson,
      note: attrs.note,
      payload: attrs.payload,
      metadata: attrs.metadata,
    })
  }

  /// The status this scan should drive its shipment to: the explicit
  /// override, else the scan type's own implication.
  pub fn target_status(&self) -> Option<Status> {
    self.status_after.or_else(|| self.scan_type.resulting_status())
  }

  /// The transition context for applying `target` on behalf of the stored
  /// scan `scan_event_id`.
  pub fn transition_context(
    &self,
    scan_event_id: Uuid,
    target: Status,
  ) -> TransitionContext {
    let mut metadata = self.metadata.clone();
    metadata.insert("scan_type".into(), Value::from(self.scan_type.as_str()));

    TransitionContext {
      force: false,
      performed_by: self.user_id,
      timestamp: Some(self.occurred_at),
      location: self.location,
      scan_event: Some(scan_event_id),
      exception: (target == Status::Exception).then(|| ExceptionDetails {
        exception_type: self
          .exception_type
          .clone()
          .unwrap_or_else(|| self.scan_type.as_str().to_owned()),
        severity:       self.exception_severity.unwrap_or_default(),
        notes:          self.note.clone(),
      }),
      return_details: (target == Status::ReturnInitiated).then(|| ReturnDetails {
        reason: self
          .return_reason
          .clone()
          .unwrap_or_else(|| self.scan_type.as_str().to_owned()),
        notes:  self.note.clone(),
      }),
      overwrite_timestamp: false,
      trigger: Some(Trigger::ScanEvent),
      source: None,
      metadata,
    }
  }
}

// ─── Stored scan event ───────────────────────────────────────────────────────

/// A stored scan. Immutable apart from `status_after`, which is back-filled
/// once in the same transaction that created the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
  pub scan_event_id: Uuid,
  pub scan_type:     ScanType,
  pub shipment_id:   Option<Uuid>,
  pub bag_id:        Option<Uuid>,
  pub route_id:      Option<Uuid>,
  pub stop_id:       Option<Uuid>,
  pub leg_id:        Option<Uuid>,
  pub branch_id:     Option<Uuid>,
  pub user_id:       Option<Uuid>,
  pub location:      Option<Location>,
  pub occurred_at:   DateTime<Utc>,
  pub geojson:       Option<Value>,
  pub note:          Option<String>,
  pub payload:       Option<Value>,
  pub metadata:      BTreeMap<String, Value>,
  /// The status the shipment held after this scan was processed.
  pub status_after:  Option<Status>,
  pub recorded_at:   DateTime<Utc>,
}

impl ScanEvent {
  /// The row written before any transition is attempted.
  pub fn from_submission(
    submission: &ScanSubmission,
    shipment_id: Option<Uuid>,
    bag_id: Option<Uuid>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      scan_event_id: Uuid::new_v4(),
      scan_type: submission.scan_type,
      shipment_id,
      bag_id,
      route_id: submission.route_id,
      stop_id: submission.stop_id,
      leg_id: submission.leg_id,
      branch_id: submission.branch_id,
      user_id: submission.user_id,
      location: submission.location,
      occurred_at: submission.occurred_at,
      geojson: submission.geojson.clone(),
      note: submission.note.clone(),
      payload: submission.payload.clone(),
      metadata: submission.metadata.clone(),
      status_after: None,
      recorded_at: now,
    }
  }
}
