//! Shipment — the tracked unit of work — and the physical entities scans can
//! resolve to (parcels, bags).
//!
//! A shipment is created at booking and mutated exclusively through the
//! lifecycle engine. It is never deleted; it ends in a terminal status.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, status::{Status, TimestampColumn}};

// ─── Location ────────────────────────────────────────────────────────────────

/// The kind of place a shipment can currently be at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
  Branch,
  Hub,
  Vehicle,
}

impl LocationType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Branch => "branch",
      Self::Hub => "hub",
      Self::Vehicle => "vehicle",
    }
  }
}

impl FromStr for LocationType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "branch" => Ok(Self::Branch),
      "hub" => Ok(Self::Hub),
      "vehicle" => Ok(Self::Vehicle),
      other => Err(Error::InvalidArgument(format!(
        "unknown location type: {other:?}"
      ))),
    }
  }
}

/// A pointer to a branch, hub or vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  #[serde(rename = "type")]
  pub kind: LocationType,
  pub id:   Uuid,
}

// ─── Milestones ──────────────────────────────────────────────────────────────

/// The write-once arrival timestamps, one per milestone-owning status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
  pub booked_at:            Option<DateTime<Utc>>,
  pub pickup_scheduled_at:  Option<DateTime<Utc>>,
  pub picked_up_at:         Option<DateTime<Utc>>,
  pub origin_hub_at:        Option<DateTime<Utc>>,
  pub bagged_at:            Option<DateTime<Utc>>,
  pub linehaul_departed_at: Option<DateTime<Utc>>,
  pub linehaul_arrived_at:  Option<DateTime<Utc>>,
  pub destination_hub_at:   Option<DateTime<Utc>>,
  pub customs_hold_at:      Option<DateTime<Utc>>,
  pub customs_cleared_at:   Option<DateTime<Utc>>,
  pub out_for_delivery_at:  Option<DateTime<Utc>>,
  pub delivered_at:         Option<DateTime<Utc>>,
  pub return_initiated_at:  Option<DateTime<Utc>>,
  pub returned_at:          Option<DateTime<Utc>>,
  pub cancelled_at:         Option<DateTime<Utc>>,
}

impl Milestones {
  pub fn get(&self, column: TimestampColumn) -> Option<DateTime<Utc>> {
    match column {
      TimestampColumn::BookedAt => self.booked_at,
      TimestampColumn::PickupScheduledAt => self.pickup_scheduled_at,
      TimestampColumn::PickedUpAt => self.picked_up_at,
      TimestampColumn::OriginHubAt => self.origin_hub_at,
      TimestampColumn::BaggedAt => self.bagged_at,
      TimestampColumn::LinehaulDepartedAt => self.linehaul_departed_at,
      TimestampColumn::LinehaulArrivedAt => self.linehaul_arrived_at,
      TimestampColumn::DestinationHubAt => self.destination_hub_at,
      TimestampColumn::CustomsHoldAt => self.customs_hold_at,
      TimestampColumn::CustomsClearedAt => self.customs_cleared_at,
      TimestampColumn::OutForDeliveryAt => self.out_for_delivery_at,
      TimestampColumn::DeliveredAt => self.delivered_at,
      TimestampColumn::ReturnInitiatedAt => self.return_initiated_at,
      TimestampColumn::ReturnedAt => self.returned_at,
      TimestampColumn::CancelledAt => self.cancelled_at,
    }
  }

  pub fn slot_mut(
    &mut self,
    column: TimestampColumn,
  ) -> &mut Option<DateTime<Utc>> {
    match column {
      TimestampColumn::BookedAt => &mut self.booked_at,
      TimestampColumn::PickupScheduledAt => &mut self.pickup_scheduled_at,
      TimestampColumn::PickedUpAt => &mut self.picked_up_at,
      TimestampColumn::OriginHubAt => &mut self.origin_hub_at,
      TimestampColumn::BaggedAt => &mut self.bagged_at,
      TimestampColumn::LinehaulDepartedAt => &mut self.linehaul_departed_at,
      TimestampColumn::LinehaulArrivedAt => &mut self.linehaul_arrived_at,
      TimestampColumn::DestinationHubAt => &mut self.destination_hub_at,
      TimestampColumn::CustomsHoldAt => &mut self.customs_hold_at,
      TimestampColumn::CustomsClearedAt => &mut self.customs_cleared_at,
      TimestampColumn::OutForDeliveryAt => &mut self.out_for_delivery_at,
      TimestampColumn::DeliveredAt => &mut self.delivered_at,
      TimestampColumn::ReturnInitiatedAt => &mut self.return_initiated_at,
      TimestampColumn::ReturnedAt => &mut self.returned_at,
      TimestampColumn::CancelledAt => &mut self.cancelled_at,
    }
  }
}

// ─── Exception & return details ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionSeverity {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

impl ExceptionSeverity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "LOW",
      Self::Medium => "MEDIUM",
      Self::High => "HIGH",
      Self::Critical => "CRITICAL",
    }
  }
}

impl FromStr for ExceptionSeverity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    [Self::Low, Self::Medium, Self::High, Self::Critical]
      .into_iter()
      .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| {
        Error::InvalidArgument(format!("unknown exception severity: {s:?}"))
      })
  }
}

/// What went wrong, supplied when a shipment enters EXCEPTION.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDetails {
  pub exception_type: String,
  #[serde(default)]
  pub severity:       ExceptionSeverity,
  pub notes:          Option<String>,
}

/// Exception state on the shipment row. Set on entry to EXCEPTION and left
/// alone by every later transition; only an explicit resolution clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionState {
  pub has_exception: bool,
  pub details:       Option<ExceptionDetails>,
  pub occurred_at:   Option<DateTime<Utc>>,
}

/// Why a shipment is being sent back, supplied on entry to RETURN_INITIATED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDetails {
  pub reason: String,
  pub notes:  Option<String>,
}

// ─── Shipment ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
  pub shipment_id:        Uuid,
  /// Immutable after booking.
  pub tracking_number:    String,
  /// Immutable after booking.
  pub awb_number:         String,
  pub customer_id:        Option<Uuid>,
  pub current_status:     Status,
  pub location:           Option<Location>,
  pub milestones:         Milestones,
  pub exception:          ExceptionState,
  pub return_details:     Option<ReturnDetails>,
  /// Weak reference to the scan that caused the latest transition.
  pub last_scan_event_id: Option<Uuid>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  /// Incremented on every write; used for optimistic concurrency checks.
  pub lock_version:       i64,
}

impl Shipment {
  /// The legacy lowercase `status` projection of `current_status`.
  pub fn status(&self) -> String { self.current_status.mirror() }
}

/// Input to booking. The store assigns the id and the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShipment {
  pub tracking_number: String,
  pub awb_number:      String,
  pub customer_id:     Option<Uuid>,
  /// Where the shipment was booked, if known.
  pub location:        Option<Location>,
}

impl NewShipment {
  pub fn new(
    tracking_number: impl Into<String>,
    awb_number: impl Into<String>,
  ) -> Self {
    Self {
      tracking_number: tracking_number.into(),
      awb_number:      awb_number.into(),
      customer_id:     None,
      location:        None,
    }
  }
}

// ─── Parcels & bags ──────────────────────────────────────────────────────────

/// A physical piece of a shipment, labelled with an SSCC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
  pub parcel_id:   Uuid,
  pub shipment_id: Uuid,
  pub sscc:        String,
  pub created_at:  DateTime<Utc>,
}

/// A consolidation bag that groups parcels for linehaul.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
  pub bag_id:     Uuid,
  pub code:       String,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn milestone_slots_round_trip() {
    let at = Utc::now();
    let mut m = Milestones::default();
    for column in TimestampColumn::iter() {
      assert_eq!(m.get(column), None);
      *m.slot_mut(column) = Some(at);
      assert_eq!(m.get(column), Some(at));
    }
  }

  #[test]
  fn severity_parses_case_insensitively() {
    assert_eq!(
      "HIGH".parse::<ExceptionSeverity>().unwrap(),
      ExceptionSeverity::High
    );
    assert_eq!(
      "critical".parse::<ExceptionSeverity>().unwrap(),
      ExceptionSeverity::Critical
    );
    assert!("severe".parse::<ExceptionSeverity>().is_err());
  }

  #[test]
  fn location_type_parses() {
    assert_eq!("hub".parse::<LocationType>().unwrap(), LocationType::Hub);
    assert!("warehouse".parse::<LocationType>().is_err());
  }
}
